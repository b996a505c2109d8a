//! Data models for Carebook

mod record;

pub use record::{normalize_clock_time, NaturalKey, NewRecord, Record, RecordId, RecordStatus};
