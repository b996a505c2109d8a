use carebook_core::view::{DashboardSummary, NotificationFeed, Projection, Summary};
use carebook_core::{RecordStatus, SharedStateStore};
use serde::Serialize;

use crate::commands::common::format_record_lines;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct SummaryOutput<'a> {
    summary: &'a Summary,
    notifications: Vec<String>,
}

pub fn run_summary(as_json: bool, store: &SharedStateStore) -> Result<(), CliError> {
    let records = store.load();
    let now = store.clock().now();
    let summary = DashboardSummary.project(&records, now);
    let notifications = NotificationFeed::default()
        .project(&records, now)
        .into_iter()
        .map(|notification| notification.message)
        .collect::<Vec<_>>();

    if as_json {
        let output = SummaryOutput {
            summary: &summary,
            notifications,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Total      {}", summary.total);
    println!("Upcoming   {}", summary.upcoming);
    for status in RecordStatus::ALL {
        println!("{:<10} {}", capitalize(status.as_str()), summary.count(status));
    }
    if let Some(next) = summary.next.as_ref() {
        let today = now.date_naive();
        for line in format_record_lines(std::slice::from_ref(next), today) {
            println!("Next       {line}");
        }
    }
    if !notifications.is_empty() {
        println!();
        for message in notifications {
            println!("- {message}");
        }
    }

    Ok(())
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
