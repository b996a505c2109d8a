//! carebook-core - Core library for Carebook
//!
//! This crate contains the appointment model, the durable storage backends,
//! and the shared-state store that keeps every open view (dashboard,
//! appointment list, notifications) consistent with one persisted collection,
//! in this process and in others sharing the same storage.

pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod store;
pub mod temporal;
pub mod util;
pub mod view;
pub mod watcher;

pub use error::{Error, Result};
pub use models::{NaturalKey, NewRecord, Record, RecordId, RecordStatus};
pub use store::{AppendOutcome, SharedStateStore, Subscription};
pub use view::{Projection, ViewAdapter};
pub use watcher::{spawn_watcher, WatchConfig, WatchHandle};
