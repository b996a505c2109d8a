//! Built-in projections for the appointment views.

use chrono::{DateTime, Local};
use serde::Serialize;

use super::Projection;
use crate::models::{normalize_clock_time, Record, RecordId, RecordStatus};
use crate::temporal::is_upcoming;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Upcoming vs. past split used by the appointment list.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentPartition;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Partition {
    /// Active appointments on or after today, in collection order
    pub upcoming: Vec<Record>,
    /// Everything else: earlier dates, completed, cancelled
    pub past: Vec<Record>,
}

impl Projection for AppointmentPartition {
    type Output = Partition;

    fn project(&self, records: &[Record], now: DateTime<Local>) -> Partition {
        let (upcoming, past) = records
            .iter()
            .cloned()
            .partition(|record| is_upcoming_active(record, now));
        Partition { upcoming, past }
    }
}

/// Counts shown on the dashboard.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardSummary;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub upcoming: usize,
    /// Soonest upcoming appointment
    pub next: Option<Record>,
}

impl Summary {
    pub const fn count(&self, status: RecordStatus) -> usize {
        match status {
            RecordStatus::Pending => self.pending,
            RecordStatus::Confirmed => self.confirmed,
            RecordStatus::Completed => self.completed,
            RecordStatus::Cancelled => self.cancelled,
        }
    }
}

impl Projection for DashboardSummary {
    type Output = Summary;

    fn project(&self, records: &[Record], now: DateTime<Local>) -> Summary {
        let mut summary = Summary {
            total: records.len(),
            ..Summary::default()
        };

        for record in records {
            match record.status {
                RecordStatus::Pending => summary.pending += 1,
                RecordStatus::Confirmed => summary.confirmed += 1,
                RecordStatus::Completed => summary.completed += 1,
                RecordStatus::Cancelled => summary.cancelled += 1,
            }
        }

        let upcoming = records
            .iter()
            .filter(|record| is_upcoming_active(record, now));
        summary.upcoming = upcoming.clone().count();
        summary.next = upcoming
            .min_by_key(|record| {
                (
                    record.scheduled_date,
                    normalize_clock_time(&record.scheduled_time),
                )
            })
            .cloned();

        summary
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    DueToday,
    Booked,
    Confirmed,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub record_id: RecordId,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: i64,
}

/// Recent activity feed: appointments due today plus recent bookings.
#[derive(Debug, Clone, Copy)]
pub struct NotificationFeed {
    /// Bookings older than this many days drop out of the feed
    pub lookback_days: i64,
    pub limit: usize,
}

impl Default for NotificationFeed {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            limit: 20,
        }
    }
}

impl Projection for NotificationFeed {
    type Output = Vec<Notification>;

    fn project(&self, records: &[Record], now: DateTime<Local>) -> Vec<Notification> {
        let today = now.date_naive();
        let cutoff = now.timestamp_millis() - self.lookback_days.max(0) * DAY_MS;

        let mut feed: Vec<Notification> = records
            .iter()
            .filter_map(|record| {
                let kind = if record.status.is_active() && record.scheduled_date == today {
                    NotificationKind::DueToday
                } else if record.created_at >= cutoff {
                    match record.status {
                        RecordStatus::Pending => NotificationKind::Booked,
                        RecordStatus::Confirmed => NotificationKind::Confirmed,
                        RecordStatus::Completed => NotificationKind::Completed,
                        RecordStatus::Cancelled => NotificationKind::Cancelled,
                    }
                } else {
                    return None;
                };

                Some(Notification {
                    record_id: record.id.clone(),
                    kind,
                    message: describe(record, kind),
                    created_at: record.created_at,
                })
            })
            .collect();

        // Stable sort keeps collection order among equal timestamps.
        feed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        feed.truncate(self.limit);
        feed
    }
}

fn is_upcoming_active(record: &Record, now: DateTime<Local>) -> bool {
    record.status.is_active() && is_upcoming(record.scheduled_date, now)
}

fn describe(record: &Record, kind: NotificationKind) -> String {
    let with = &record.counterpart;
    let time = if record.scheduled_time.is_empty() {
        "any time"
    } else {
        record.scheduled_time.as_str()
    };
    let when = format!("{} at {time}", record.scheduled_date);

    match kind {
        NotificationKind::DueToday => format!("Today: appointment with {with} at {time}"),
        NotificationKind::Booked => format!("Booked appointment with {with} on {when}"),
        NotificationKind::Confirmed => format!("Appointment with {with} on {when} is confirmed"),
        NotificationKind::Completed => format!("Appointment with {with} on {when} completed"),
        NotificationKind::Cancelled => format!("Appointment with {with} on {when} was cancelled"),
    }
}
