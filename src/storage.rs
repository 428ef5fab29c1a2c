//! SQLite storage layer for postboard.
//!
//! Owns the schema for profiles, posts and comments and provides the CRUD
//! operations the web handlers use.  Foreign keys are enforced with
//! `ON DELETE CASCADE`, and the delete operations also remove children
//! explicitly inside one transaction.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StorageError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    NotFound(String),
    /// A unique constraint was violated.
    AlreadyExists(String),
    /// A foreign key pointed at a row that does not exist.
    MissingParent(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Sqlite(e) => write!(f, "sqlite error: {e}"),
            StorageError::Io(e) => write!(f, "io error: {e}"),
            StorageError::NotFound(msg) => write!(f, "not found: {msg}"),
            StorageError::AlreadyExists(msg) => write!(f, "already exists: {msg}"),
            StorageError::MissingParent(msg) => write!(f, "missing parent: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref err, ref msg) = e {
            let detail = msg.clone().unwrap_or_else(|| err.to_string());
            match err.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return StorageError::AlreadyExists(detail)
                }
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    return StorageError::MissingParent(detail)
                }
                _ => {}
            }
        }
        StorageError::Sqlite(e)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// Profile row. `password` holds the salted hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRow {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRow {
    pub id: i64,
    pub profile_id: i64,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub content: String,
}

/// A post together with its comments, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostThread {
    pub post: PostRow,
    pub comments: Vec<CommentRow>,
}

/// What a cascading profile delete removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileDeletion {
    pub posts: usize,
    pub comments: usize,
}

fn profile_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        id: row.get(0)?,
        firstname: row.get(1)?,
        lastname: row.get(2)?,
        username: row.get(3)?,
        password: row.get(4)?,
    })
}

fn post_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        profile_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
    })
}

fn comment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        content: row.get(2)?,
    })
}

// ---------------------------------------------------------------------------
// Storage handle
// ---------------------------------------------------------------------------

/// Main storage handle wrapping a SQLite connection.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open or create a database at the given path. Creates schema if needed.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let storage = Self { conn };
        storage.create_schema()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let storage = Self { conn };
        storage.create_schema()?;
        Ok(storage)
    }

    fn create_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS profiles (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                firstname   TEXT NOT NULL,
                lastname    TEXT NOT NULL,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS posts (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                profile_id  INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                title       TEXT NOT NULL,
                content     TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_posts_profile ON posts(profile_id, id);

            CREATE TABLE IF NOT EXISTS comments (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                content     TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, id);
            ",
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Profiles CRUD
    // -----------------------------------------------------------------------

    /// Insert a profile and return its assigned id. `row.id` is ignored.
    pub fn insert_profile(&self, row: &ProfileRow) -> Result<i64, StorageError> {
        self.conn
            .execute(
                "INSERT INTO profiles (firstname, lastname, username, password)
                 VALUES (?1, ?2, ?3, ?4)",
                params![row.firstname, row.lastname, row.username, row.password],
            )
            .map_err(|e| match StorageError::from(e) {
                StorageError::AlreadyExists(_) => {
                    StorageError::AlreadyExists(format!("username {}", row.username))
                }
                other => other,
            })?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_profile(&self, id: i64) -> Result<Option<ProfileRow>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, firstname, lastname, username, password
                 FROM profiles WHERE id = ?1",
                params![id],
                profile_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Like [`Storage::get_profile`] but absent rows are an error.
    pub fn require_profile(&self, id: i64) -> Result<ProfileRow, StorageError> {
        self.get_profile(id)?
            .ok_or_else(|| StorageError::NotFound(format!("profile {id}")))
    }

    pub fn list_profiles(&self) -> Result<Vec<ProfileRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, firstname, lastname, username, password
             FROM profiles ORDER BY id",
        )?;
        let rows = stmt.query_map([], profile_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn count_profiles(&self) -> Result<i64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Update first and last name only. Returns false if no such profile.
    pub fn update_profile_names(
        &self,
        id: i64,
        firstname: &str,
        lastname: &str,
    ) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "UPDATE profiles SET firstname = ?1, lastname = ?2 WHERE id = ?3",
            params![firstname, lastname, id],
        )?;
        Ok(affected > 0)
    }

    /// Delete a profile with all of its posts and their comments in one
    /// transaction. Returns `None` if the profile did not exist.
    pub fn delete_profile(&self, id: i64) -> Result<Option<ProfileDeletion>, StorageError> {
        let tx = self.conn.unchecked_transaction()?;

        let comments = tx.execute(
            "DELETE FROM comments
             WHERE post_id IN (SELECT id FROM posts WHERE profile_id = ?1)",
            params![id],
        )?;
        let posts = tx.execute("DELETE FROM posts WHERE profile_id = ?1", params![id])?;
        let affected = tx.execute("DELETE FROM profiles WHERE id = ?1", params![id])?;

        if affected == 0 {
            tx.rollback()?;
            return Ok(None);
        }
        tx.commit()?;
        Ok(Some(ProfileDeletion { posts, comments }))
    }

    // -----------------------------------------------------------------------
    // Posts CRUD
    // -----------------------------------------------------------------------

    /// Insert a post and return its id. Fails with `MissingParent` if the
    /// owning profile does not exist. `row.id` is ignored.
    pub fn insert_post(&self, row: &PostRow) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO posts (profile_id, title, content) VALUES (?1, ?2, ?3)",
            params![row.profile_id, row.title, row.content],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_post(&self, id: i64) -> Result<Option<PostRow>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, profile_id, title, content FROM posts WHERE id = ?1",
                params![id],
                post_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn require_post(&self, id: i64) -> Result<PostRow, StorageError> {
        self.get_post(id)?
            .ok_or_else(|| StorageError::NotFound(format!("post {id}")))
    }

    pub fn list_posts(&self) -> Result<Vec<PostRow>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, profile_id, title, content FROM posts ORDER BY id")?;
        let rows = stmt.query_map([], post_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn list_posts_for_profile(&self, profile_id: i64) -> Result<Vec<PostRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, profile_id, title, content
             FROM posts WHERE profile_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![profile_id], post_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn count_posts_for_profile(&self, profile_id: i64) -> Result<i64, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE profile_id = ?1",
            params![profile_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn update_post(&self, id: i64, title: &str, content: &str) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "UPDATE posts SET title = ?1, content = ?2 WHERE id = ?3",
            params![title, content, id],
        )?;
        Ok(affected > 0)
    }

    /// Delete a post and its comments. Returns false if no such post.
    pub fn delete_post(&self, id: i64) -> Result<bool, StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM comments WHERE post_id = ?1", params![id])?;
        let affected = tx.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Comments
    // -----------------------------------------------------------------------

    /// Insert a comment and return its id. Fails with `MissingParent` if the
    /// post does not exist. `row.id` is ignored.
    pub fn insert_comment(&self, row: &CommentRow) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO comments (post_id, content) VALUES (?1, ?2)",
            params![row.post_id, row.content],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_comment(&self, id: i64) -> Result<Option<CommentRow>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, post_id, content FROM comments WHERE id = ?1",
                params![id],
                comment_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_comments(&self) -> Result<Vec<CommentRow>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, post_id, content FROM comments ORDER BY id")?;
        let rows = stmt.query_map([], comment_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn list_comments_for_post(&self, post_id: i64) -> Result<Vec<CommentRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, post_id, content FROM comments WHERE post_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![post_id], comment_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn count_comments_for_post(&self, post_id: i64) -> Result<i64, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
            params![post_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Composite reads
    // -----------------------------------------------------------------------

    /// Load a profile and its posts, each with its comments.
    pub fn get_profile_with_posts(
        &self,
        id: i64,
    ) -> Result<(ProfileRow, Vec<PostThread>), StorageError> {
        let profile = self.require_profile(id)?;
        let mut threads = Vec::new();
        for post in self.list_posts_for_profile(id)? {
            let comments = self.list_comments_for_post(post.id)?;
            threads.push(PostThread { post, comments });
        }
        Ok((profile, threads))
    }
}

/// Default database location when none is configured.
pub fn default_db_path() -> PathBuf {
    PathBuf::from("postboard.db")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
