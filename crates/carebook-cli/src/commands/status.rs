use carebook_core::{Record, RecordStatus, SharedStateStore};

use crate::commands::common::{resolve_record, short_id};
use crate::error::CliError;

pub fn run_set_status(
    query: &str,
    status: RecordStatus,
    store: &SharedStateStore,
) -> Result<Record, CliError> {
    let record = resolve_record(query, store)?;
    let updated = store.update_status(&record.id, status)?;

    if record.status == status {
        println!("Appointment {} is already {status}", short_id(&updated.id));
    } else {
        println!(
            "Appointment {} {} -> {status}",
            short_id(&updated.id),
            record.status
        );
    }
    Ok(updated)
}
