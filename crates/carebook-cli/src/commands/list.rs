use carebook_core::view::{AppointmentPartition, Projection};
use carebook_core::{Record, SharedStateStore};

use crate::cli::ListView;
use crate::commands::common::{format_record_lines, record_to_list_item, RecordListItem};
use crate::error::CliError;

pub fn list_records(view: ListView, limit: Option<usize>, store: &SharedStateStore) -> Vec<Record> {
    let records = store.load();
    let now = store.clock().now();

    let mut selected = match view {
        ListView::All => records,
        ListView::Upcoming => AppointmentPartition.project(&records, now).upcoming,
        ListView::Past => AppointmentPartition.project(&records, now).past,
    };
    if let Some(limit) = limit {
        selected.truncate(limit);
    }
    selected
}

pub fn run_list(
    view: ListView,
    limit: Option<usize>,
    as_json: bool,
    store: &SharedStateStore,
) -> Result<(), CliError> {
    let records = list_records(view, limit, store);

    if as_json {
        let json_items = records
            .iter()
            .map(record_to_list_item)
            .collect::<Vec<RecordListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if records.is_empty() {
        println!("No appointments");
    } else {
        let today = store.clock().now().date_naive();
        for line in format_record_lines(&records, today) {
            println!("{line}");
        }
    }

    Ok(())
}
