use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::oneshot;

use postboard::hashing::PasswordHasher;
use postboard::storage::Storage;
use postboard::web::router::build_router;
use postboard::web::state::{shared_state, SharedState};

struct TestServer {
    base_url: String,
    state: SharedState,
    shutdown_tx: oneshot::Sender<()>,
    _dir: TempDir,
}

async fn start_server() -> TestServer {
    let dir = TempDir::new().expect("temp dir");
    let storage = Storage::open(&dir.path().join("postboard.db")).expect("open storage");
    let state = shared_state(storage, PasswordHasher::default());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind server");
    let addr = listener.local_addr().expect("server addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let server = axum::serve(listener, build_router(state.clone())).with_graceful_shutdown(async {
        let _ = shutdown_rx.await;
    });
    tokio::spawn(async move {
        let _ = server.await;
    });

    TestServer {
        base_url: format!("http://{}", addr),
        state,
        shutdown_tx,
        _dir: dir,
    }
}

#[derive(Debug)]
struct Reply {
    status: u16,
    location: Option<String>,
    flash_cookie: Option<String>,
    flash_header: Option<String>,
    json: Value,
}

fn agent() -> ureq::Agent {
    ureq::AgentBuilder::new().redirects(0).build()
}

fn into_reply(result: Result<ureq::Response, ureq::Error>) -> Reply {
    let response = match result {
        Ok(r) => r,
        Err(ureq::Error::Status(_, r)) => r,
        Err(e) => panic!("transport error: {e}"),
    };
    let status = response.status();
    let location = response.header("location").map(String::from);
    let flash_header = response
        .all("set-cookie")
        .into_iter()
        .find(|c| c.starts_with("flash="))
        .map(String::from);
    let flash_cookie = flash_header
        .as_deref()
        .and_then(|c| c.split(';').next())
        .map(String::from);
    let body = response.into_string().expect("response body");
    let json = serde_json::from_str(&body).unwrap_or(Value::Null);
    Reply {
        status,
        location,
        flash_cookie,
        flash_header,
        json,
    }
}

async fn get(base_url: &str, path: &str, cookie: Option<String>) -> Reply {
    let url = format!("{base_url}{path}");
    tokio::task::spawn_blocking(move || {
        let mut request = agent().get(&url);
        if let Some(cookie) = cookie {
            request = request.set("Cookie", &cookie);
        }
        into_reply(request.call())
    })
    .await
    .expect("get task")
}

async fn post_form(base_url: &str, path: &str, fields: &[(&str, &str)]) -> Reply {
    let url = format!("{base_url}{path}");
    let fields: Vec<(String, String)> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    tokio::task::spawn_blocking(move || {
        let pairs: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        into_reply(agent().post(&url).send_form(&pairs))
    })
    .await
    .expect("post task")
}

/// POST a body with no `Content-Type` header.
async fn post_untyped(base_url: &str, path: &str, body: &str) -> Reply {
    let url = format!("{base_url}{path}");
    let body = body.to_string();
    tokio::task::spawn_blocking(move || into_reply(agent().post(&url).send_string(&body)))
        .await
        .expect("post task")
}

async fn create_profile(base_url: &str, username: &str) -> i64 {
    let reply = post_form(
        base_url,
        "/new",
        &[
            ("firstname", "First"),
            ("lastname", "Last"),
            ("username", username),
            ("password", "plaintext-pw"),
        ],
    )
    .await;
    assert_eq!(reply.status, 201, "create failed: {:?}", reply.json);
    reply.json["profile"]["id"].as_i64().expect("profile id")
}

#[tokio::test]
async fn create_profile_stores_hashed_password() {
    let server = start_server().await;

    let reply = post_form(
        &server.base_url,
        "/new",
        &[
            ("firstname", "Alice"),
            ("lastname", "Liddell"),
            ("username", "alice"),
            ("password", "wonderland"),
        ],
    )
    .await;
    assert_eq!(reply.status, 201);
    assert_eq!(reply.json["profile"]["username"], "alice");
    assert!(reply.json["profile"].get("password").is_none());
    assert_eq!(reply.json["flashes"][0], "alice added successfully");
    let id = reply.json["profile"]["id"].as_i64().unwrap();

    {
        let st = server.state.lock().await;
        let stored = st.storage.require_profile(id).unwrap();
        assert_eq!(stored.firstname, "Alice");
        assert_eq!(stored.lastname, "Liddell");
        assert_ne!(stored.password, "wonderland");
        assert_eq!(stored.password, PasswordHasher::default().hash("wonderland"));
    }

    let form = get(&server.base_url, "/new", None).await;
    assert_eq!(form.status, 200);
    assert_eq!(form.json["fields"].as_array().unwrap().len(), 4);

    server.shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
    let server = start_server().await;
    create_profile(&server.base_url, "alice").await;

    let reply = post_form(
        &server.base_url,
        "/new",
        &[
            ("firstname", "Other"),
            ("lastname", "Person"),
            ("username", "alice"),
            ("password", "x"),
        ],
    )
    .await;
    assert_eq!(reply.status, 409);
    assert_eq!(reply.json["error"], "username alice already exists");
    assert_eq!(server.state.lock().await.storage.count_profiles().unwrap(), 1);

    server.shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn missing_fields_are_bad_requests() {
    let server = start_server().await;

    let reply = post_form(&server.base_url, "/new", &[("firstname", "A")]).await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.json["error"], "missing field: lastname");

    let id = create_profile(&server.base_url, "alice").await;
    let path = format!("/read/{id}");

    let reply = post_form(&server.base_url, &path, &[]).await;
    assert_eq!(reply.status, 400);

    let reply = post_form(&server.base_url, &path, &[("comment_content", "hi")]).await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.json["error"], "missing field: post_id");

    let reply = post_form(
        &server.base_url,
        &path,
        &[("comment_content", "hi"), ("post_id", "nope")],
    )
    .await;
    assert_eq!(reply.status, 400);

    let reply = post_form(
        &server.base_url,
        &format!("/update/{id}"),
        &[("firstname", "Only")],
    )
    .await;
    assert_eq!(reply.status, 400);

    let reply = get(&server.base_url, "/read/not-a-number", None).await;
    assert_eq!(reply.status, 400);
    assert!(reply.json["error"].is_string());

    server.shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn malformed_requests_get_json_errors() {
    let server = start_server().await;
    let id = create_profile(&server.base_url, "alice").await;
    let path = format!("/read/{id}");

    // A repeated key keeps its first value.
    let reply = post_form(
        &server.base_url,
        &path,
        &[("post_content", "first"), ("post_content", "second")],
    )
    .await;
    assert_eq!(reply.status, 201);
    assert_eq!(reply.json["posts"][0]["content"], "first");
    assert_eq!(reply.json["created"]["kind"], "post");
    assert_eq!(reply.json["created"]["id"], reply.json["posts"][0]["id"]);

    let reply = post_untyped(&server.base_url, &path, "post_content=x").await;
    assert_eq!(reply.status, 400);
    let error = reply.json["error"].as_str().expect("json error");
    assert!(error.contains("Content-Type"), "{error}");

    let reply = post_untyped(&server.base_url, "/new", "username=bob").await;
    assert_eq!(reply.status, 400);
    assert!(reply.json["error"].is_string());

    for bad in ["/read/abc", "/update/abc", "/delete/abc"] {
        let reply = get(&server.base_url, bad, None).await;
        assert_eq!(reply.status, 400, "GET {bad}");
        let error = reply.json["error"].as_str().expect("json error");
        assert!(error.starts_with("Invalid URL"), "{error}");
    }

    let reply = post_form(&server.base_url, "/update/abc", &[("firstname", "A")]).await;
    assert_eq!(reply.status, 400);
    assert!(reply.json["error"].is_string());

    assert_eq!(
        server.state.lock().await.storage.count_posts_for_profile(id).unwrap(),
        1
    );

    server.shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let server = start_server().await;

    for path in ["/read/999", "/update/999", "/delete/999"] {
        let reply = get(&server.base_url, path, None).await;
        assert_eq!(reply.status, 404, "GET {path}");
        assert_eq!(reply.json["error"], "profile 999 not found");
    }

    let reply = post_form(&server.base_url, "/read/999", &[("post_content", "x")]).await;
    assert_eq!(reply.status, 404);

    let id = create_profile(&server.base_url, "alice").await;
    let reply = post_form(
        &server.base_url,
        &format!("/read/{id}"),
        &[("comment_content", "hi"), ("post_id", "4242")],
    )
    .await;
    assert_eq!(reply.status, 404);
    assert_eq!(reply.json["error"], "post 4242 not found");

    server.shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn adding_a_post_only_touches_that_profile() {
    let server = start_server().await;
    let alice = create_profile(&server.base_url, "alice").await;
    let bob = create_profile(&server.base_url, "bob").await;

    post_form(
        &server.base_url,
        &format!("/read/{bob}"),
        &[("post_content", "bob was here")],
    )
    .await;

    let reply = post_form(
        &server.base_url,
        &format!("/read/{alice}"),
        &[("post_content", "hello")],
    )
    .await;
    assert_eq!(reply.status, 201);
    assert_eq!(reply.json["flashes"][0], "Posted!");
    let posts = reply.json["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["title"], "Posted by: alice");
    assert_eq!(posts[0]["content"], "hello");

    let st = server.state.lock().await;
    assert_eq!(st.storage.count_posts_for_profile(alice).unwrap(), 1);
    assert_eq!(st.storage.count_posts_for_profile(bob).unwrap(), 1);
    drop(st);

    server.shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn adding_a_comment_increments_post_comments() {
    let server = start_server().await;
    let alice = create_profile(&server.base_url, "alice").await;
    let path = format!("/read/{alice}");

    let reply = post_form(&server.base_url, &path, &[("post_content", "hello")]).await;
    let post_id = reply.json["posts"][0]["id"].as_i64().unwrap();
    let post_id_str = post_id.to_string();

    for expected in 1..=2i64 {
        let reply = post_form(
            &server.base_url,
            &path,
            &[("comment_content", "hi"), ("post_id", post_id_str.as_str())],
        )
        .await;
        assert_eq!(reply.status, 201);
        assert_eq!(reply.json["flashes"][0], "Commented!");
        let st = server.state.lock().await;
        assert_eq!(st.storage.count_comments_for_post(post_id).unwrap(), expected);
    }

    let view = get(&server.base_url, &path, None).await;
    assert_eq!(view.status, 200);
    assert_eq!(view.json["profile"]["username"], "alice");
    assert_eq!(view.json["posts"][0]["comments"].as_array().unwrap().len(), 2);

    server.shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn update_changes_names_only_and_redirects() {
    let server = start_server().await;
    let id = create_profile(&server.base_url, "alice").await;
    let before = server.state.lock().await.storage.require_profile(id).unwrap();

    let edit = get(&server.base_url, &format!("/update/{id}"), None).await;
    assert_eq!(edit.status, 200);
    assert_eq!(edit.json["profile"]["firstname"], "First");

    let reply = post_form(
        &server.base_url,
        &format!("/update/{id}"),
        &[
            ("firstname", "Alice"),
            ("lastname", "Liddell"),
            ("username", "mallory"),
        ],
    )
    .await;
    assert_eq!(reply.status, 303);
    assert_eq!(reply.location.as_deref(), Some("/"));

    let after = server.state.lock().await.storage.require_profile(id).unwrap();
    assert_eq!(after.firstname, "Alice");
    assert_eq!(after.lastname, "Liddell");
    assert_eq!(after.username, before.username);
    assert_eq!(after.password, before.password);

    // The confirmation shows up once on the list page, which expires the cookie.
    let list = get(&server.base_url, "/", reply.flash_cookie.clone()).await;
    assert_eq!(list.json["flashes"][0], "alice updated successfully");
    assert_eq!(list.json["profiles"][0]["firstname"], "Alice");
    assert_eq!(list.flash_cookie.as_deref(), Some("flash="));
    let cleared = list.flash_header.expect("flash cleared");
    assert!(cleared.contains("Max-Age=0"), "{cleared}");

    let later = get(&server.base_url, "/", None).await;
    assert!(later.json["flashes"].as_array().unwrap().is_empty());
    assert!(later.flash_header.is_none());

    server.shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn list_returns_profiles_in_insertion_order() {
    let server = start_server().await;
    for name in ["carol", "alice", "bob"] {
        create_profile(&server.base_url, name).await;
    }

    let list = get(&server.base_url, "/", None).await;
    assert_eq!(list.status, 200);
    let names: Vec<&str> = list.json["profiles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["carol", "alice", "bob"]);
    assert!(list.json["flashes"].as_array().unwrap().is_empty());

    let health = get(&server.base_url, "/health", None).await;
    assert_eq!(health.json["status"], "ok");
    assert_eq!(health.json["profiles"], 3);

    server.shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn end_to_end_alice_scenario() {
    let server = start_server().await;
    let alice = create_profile(&server.base_url, "alice").await;
    let bob = create_profile(&server.base_url, "bob").await;
    let path = format!("/read/{alice}");

    let reply = post_form(&server.base_url, &path, &[("post_content", "hello")]).await;
    let post_id = reply.json["posts"][0]["id"].as_i64().unwrap();

    let reply = post_form(
        &server.base_url,
        &path,
        &[("comment_content", "hi"), ("post_id", post_id.to_string().as_str())],
    )
    .await;
    let comment_id = reply.json["posts"][0]["comments"][0]["id"].as_i64().unwrap();

    let reply = get(&server.base_url, &format!("/delete/{alice}"), None).await;
    assert_eq!(reply.status, 303);
    assert_eq!(reply.location.as_deref(), Some("/"));

    {
        let st = server.state.lock().await;
        assert!(st.storage.get_profile(alice).unwrap().is_none());
        assert!(st.storage.get_post(post_id).unwrap().is_none());
        assert!(st.storage.get_comment(comment_id).unwrap().is_none());
        assert!(st.storage.get_profile(bob).unwrap().is_some());
    }

    assert_eq!(get(&server.base_url, &path, None).await.status, 404);

    let list = get(&server.base_url, "/", reply.flash_cookie).await;
    assert_eq!(list.json["flashes"][0], "Deleted successfully");
    assert_eq!(list.json["profiles"].as_array().unwrap().len(), 1);

    server.shutdown_tx.send(()).ok();
}
