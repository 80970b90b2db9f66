//! Business-day helpers.
//!
//! All dating of ledger events happens in one business timezone. The business
//! day does not cut over at midnight: anything recorded at or after
//! [`DAILY_CUTOFF_HOUR`] belongs to the *next* day's daily snapshot, so the
//! late-evening close-of-books lands in the period it is reported under.

use chrono::{DateTime, Datelike, Days, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::Tz;

/// Timezone all business dates are computed in.
pub const BUSINESS_TZ: Tz = chrono_tz::Asia::Shanghai;

/// Hour (in [`BUSINESS_TZ`]) at which the business day rolls over.
pub const DAILY_CUTOFF_HOUR: u32 = 23;

/// Returns the business date an instant belongs to.
#[must_use]
pub fn business_date(at: DateTime<Utc>) -> NaiveDate {
    let local = at.with_timezone(&BUSINESS_TZ);
    let date = local.date_naive();
    if local.hour() >= DAILY_CUTOFF_HOUR {
        // Saturating: only fails at the end of representable time.
        date.checked_add_days(Days::new(1)).unwrap_or(date)
    } else {
        date
    }
}

/// Weekday label stored on orders, derived from the creation business date.
#[must_use]
pub fn weekday_label(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn late_evening_belongs_to_next_day() {
        // 2025-03-10 23:30 in Shanghai is 15:30 UTC.
        let at = Utc.with_ymd_and_hms(2025, 3, 10, 15, 30, 0).unwrap();
        assert_eq!(
            business_date(at),
            NaiveDate::from_ymd_opt(2025, 3, 11).unwrap()
        );
    }

    #[test]
    fn afternoon_stays_on_same_day() {
        // 2025-03-10 14:00 in Shanghai is 06:00 UTC.
        let at = Utc.with_ymd_and_hms(2025, 3, 10, 6, 0, 0).unwrap();
        assert_eq!(
            business_date(at),
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
        );
    }

    #[test]
    fn weekday_labels() {
        assert_eq!(
            weekday_label(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()),
            "Mon"
        );
        assert_eq!(
            weekday_label(NaiveDate::from_ymd_opt(2025, 3, 16).unwrap()),
            "Sun"
        );
    }
}
