pub mod hashing;
pub mod logging;
pub mod storage;
pub mod web;
