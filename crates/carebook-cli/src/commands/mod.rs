pub mod book;
pub mod common;
pub mod completions;
pub mod config;
pub mod list;
pub mod status;
pub mod summary;
pub mod watch;
