//! Upcoming/past classification of scheduled dates.

use chrono::{DateTime, NaiveDate, TimeZone};

/// Whether an appointment on `scheduled_date` is still upcoming at `now`.
///
/// Compares calendar dates only, in `now`'s time zone: today counts as
/// upcoming whatever the appointment's time of day.
///
/// # Examples
///
/// ```
/// use carebook_core::temporal::is_upcoming;
/// use chrono::{NaiveDate, TimeZone, Utc};
///
/// let now = Utc.with_ymd_and_hms(2025, 3, 1, 23, 59, 0).unwrap();
/// assert!(is_upcoming(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), now));
/// assert!(!is_upcoming(NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(), now));
/// ```
pub fn is_upcoming<Tz: TimeZone>(scheduled_date: NaiveDate, now: DateTime<Tz>) -> bool {
    scheduled_date >= now.date_naive()
}
