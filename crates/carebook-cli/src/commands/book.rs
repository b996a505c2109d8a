use carebook_core::{NewRecord, Record, RecordId, SharedStateStore};
use chrono::NaiveDate;

use crate::commands::common::{normalize_record_identifier, parse_field};
use crate::error::CliError;

pub fn build_candidate(
    subject: String,
    counterpart: String,
    date: NaiveDate,
    time: String,
    specialty: Option<String>,
    id: Option<&str>,
    fields: &[String],
) -> Result<NewRecord, CliError> {
    let mut candidate = NewRecord::new(subject, counterpart, date, time);
    if let Some(specialty) = specialty {
        candidate = candidate.with_specialty(specialty);
    }
    if let Some(id) = id {
        let id = normalize_record_identifier(id)?;
        candidate = candidate.with_id(RecordId::from(id.as_str()));
    }
    for raw in fields {
        let (key, value) = parse_field(raw)?;
        candidate = candidate.with_extra(key, value);
    }
    Ok(candidate)
}

/// Store the appointment and print its id.
///
/// Booking the same appointment twice prints the id of the one already stored.
pub fn run_book(candidate: NewRecord, store: &SharedStateStore) -> Result<Record, CliError> {
    let outcome = store.append_with_outcome(candidate)?;
    let record = outcome.record();

    if outcome.is_inserted() {
        tracing::info!(id = %record.id, "Booked appointment");
    } else {
        eprintln!(
            "Appointment with {} on {} at {} was already booked",
            record.counterpart, record.scheduled_date, record.scheduled_time
        );
    }

    println!("{}", record.id);
    Ok(outcome.into_record())
}
