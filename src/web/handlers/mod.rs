//! Route handler modules for the postboard HTTP surface.

pub mod health;
pub mod profiles;
pub mod read;
