use std::path::Path;
use std::sync::Arc;

use carebook_core::storage::{FileStorage, SqliteStorage, StorageBackend};
use carebook_core::temporal::is_upcoming;
use carebook_core::view::Partition;
use carebook_core::{Record, RecordId, RecordStatus, SharedStateStore};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use serde_json::Value;

use crate::cli::BackendKind;
use crate::config::EffectiveConfig;
use crate::error::CliError;

const SHORT_ID_LEN: usize = 13;

#[derive(Debug, Serialize)]
pub struct RecordListItem {
    pub id: String,
    pub subject: String,
    pub with: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    pub date: NaiveDate,
    pub time: String,
    pub status: RecordStatus,
    pub upcoming: bool,
    pub relative_day: String,
}

/// Open the configured backend and wrap it in a store.
pub fn open_store(config: &EffectiveConfig) -> Result<Arc<SharedStateStore>, CliError> {
    let storage: Arc<dyn StorageBackend> = match config.backend {
        BackendKind::Sqlite => Arc::new(SqliteStorage::open(&config.data_path)?),
        BackendKind::File => Arc::new(FileStorage::open(&config.data_path)?),
    };

    let seed = match config.seed_path.as_deref() {
        Some(path) => load_seed(path)?,
        None => Vec::new(),
    };

    tracing::debug!(
        backend = storage.name(),
        path = %config.data_path.display(),
        key = %config.sync.storage_key,
        "Opened store"
    );

    Ok(Arc::new(
        SharedStateStore::new(config.sync.storage_key.clone(), storage).with_seed(seed),
    ))
}

pub fn load_seed(path: &Path) -> Result<Vec<Record>, CliError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|error| CliError::Seed(format!("{}: {error}", path.display())))?;
    serde_json::from_str(&raw).map_err(|error| CliError::Seed(format!("{}: {error}", path.display())))
}

pub fn normalize_record_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyRecordId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Find a record by exact id, falling back to a unique id prefix.
pub fn resolve_record(query: &str, store: &SharedStateStore) -> Result<Record, CliError> {
    let query = normalize_record_identifier(query)?;

    if let Some(record) = store.get(&RecordId::from(query.as_str())) {
        return Ok(record);
    }

    let matching_ids = store.find_by_prefix(&query, 3);

    match matching_ids.as_slice() {
        [] => Err(CliError::RecordNotFound(query)),
        [id] => store
            .get(id)
            .ok_or_else(|| CliError::RecordNotFound(query.clone())),
        _ => {
            let options = matching_ids
                .iter()
                .map(|id| short_id(id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousRecordId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// Parse a `KEY=VALUE` pair. Values that parse as JSON keep their type.
pub fn parse_field(raw: &str) -> Result<(String, Value), CliError> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(CliError::InvalidField(raw.to_string()));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::InvalidField(raw.to_string()));
    }

    let value = value.trim();
    let parsed =
        serde_json::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), parsed))
}

pub fn short_id(id: &RecordId) -> String {
    id.as_str().chars().take(SHORT_ID_LEN).collect()
}

pub fn format_record_lines(records: &[Record], today: NaiveDate) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let short_id = short_id(&record.id);
            let when = format!("{} {}", record.scheduled_date, record.scheduled_time);
            let relative_day = format_relative_day(record.scheduled_date, today);
            let status = record.status.as_str();
            let mut line = format!(
                "{short_id:<13}  {when:<17}  {relative_day:<10}  {status:<9}  {} with {}",
                record.subject, record.counterpart
            );
            if let Some(specialty) = record.specialty.as_deref() {
                line.push_str(&format!(" ({specialty})"));
            }
            line
        })
        .collect()
}

pub fn format_partition_lines(partition: &Partition, today: NaiveDate) -> Vec<String> {
    let mut lines = vec![format!("Upcoming ({})", partition.upcoming.len())];
    lines.extend(format_record_lines(&partition.upcoming, today));
    lines.push(format!("Past ({})", partition.past.len()));
    lines.extend(format_record_lines(&partition.past, today));
    lines
}

pub fn format_relative_day(date: NaiveDate, today: NaiveDate) -> String {
    let days = date.signed_duration_since(today).num_days();
    match days {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        -1 => "yesterday".to_string(),
        days if days > 0 => format!("in {days}d"),
        days => format!("{}d ago", -days),
    }
}

pub fn record_to_list_item(record: &Record) -> RecordListItem {
    let now = Local::now();
    RecordListItem {
        id: record.id.to_string(),
        subject: record.subject.clone(),
        with: record.counterpart.clone(),
        specialty: record.specialty.clone(),
        date: record.scheduled_date,
        time: record.scheduled_time.clone(),
        status: record.status,
        upcoming: record.status.is_active() && is_upcoming(record.scheduled_date, now),
        relative_day: format_relative_day(record.scheduled_date, now.date_naive()),
    }
}
