use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub title: String,
    pub start_time: DateTime<Utc>,
}

// One poll's slice of the calendar: 03:00 local on `date` up to 03:00 local
// on the following day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

const DAY_WINDOW_START_HOUR: u32 = 3;

impl DayWindow {
    pub fn for_date(date: NaiveDate, tz: Tz) -> Self {
        Self {
            date,
            start: window_edge(date, tz),
            end: window_edge(date + Duration::days(1), tz),
        }
    }
}

fn window_edge(date: NaiveDate, tz: Tz) -> DateTime<Tz> {
    let naive = date.and_hms_opt(DAY_WINDOW_START_HOUR, 0, 0).unwrap();
    tz.from_local_datetime(&naive)
        .single()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    #[test]
    fn window_runs_from_three_to_three_local() {
        let window = DayWindow::for_date(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), New_York);
        assert_eq!(window.start.to_rfc3339(), "2026-03-02T03:00:00-05:00");
        assert_eq!(window.end.to_rfc3339(), "2026-03-03T03:00:00-05:00");
        assert_eq!(window.end - window.start, Duration::hours(24));
    }

    #[test]
    fn window_follows_local_clock_across_dst() {
        // DST starts 2026-03-08 in the US, so this window is an hour short.
        let window = DayWindow::for_date(NaiveDate::from_ymd_opt(2026, 3, 7).unwrap(), New_York);
        assert_eq!(window.end - window.start, Duration::hours(23));
    }
}
