use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

// ============================================================================
// Clock - injectable time source
// ============================================================================
//
// Order numbers are scoped to the server's local calendar day, while all
// lifecycle timestamps are recorded in UTC.
//
// ============================================================================

pub trait Clock: Send + Sync {
    /// Current instant, used for lifecycle timestamps
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar day in the server's local reckoning
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to a single instant and day.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
    today: NaiveDate,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>, today: NaiveDate) -> Self {
        Self { now, today }
    }

    /// Noon UTC on the given day, with the local day equal to `day`
    pub fn on(day: NaiveDate) -> Self {
        let noon = day.and_hms_opt(12, 0, 0).unwrap_or_default();
        Self {
            now: Utc.from_utc_datetime(&noon),
            today: day,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn today(&self) -> NaiveDate {
        self.today
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_reports_pinned_day() {
        let day = NaiveDate::from_ymd_opt(2024, 4, 15).unwrap();
        let clock = FixedClock::on(day);

        assert_eq!(clock.today(), day);
        assert_eq!(clock.now().date_naive(), day);
    }
}
