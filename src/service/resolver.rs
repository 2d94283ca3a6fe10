use chrono::{DateTime, Duration, Utc};

use crate::models::event::CalendarEvent;

pub struct AlarmTimeResolver;

impl AlarmTimeResolver {
    // Events must arrive ordered by start time. A marker-titled event rings
    // at its own start; otherwise the first event's start shifted by
    // `offset_minutes`. Past instants are still returned, staleness is the
    // caller's call.
    pub fn resolve(
        events: &[CalendarEvent],
        marker_title: &str,
        offset_minutes: i64,
    ) -> Option<DateTime<Utc>> {
        let marker = marker_title.trim().to_lowercase();
        if let Some(event) = events
            .iter()
            .find(|event| event.title.trim().to_lowercase() == marker)
        {
            return Some(event.start_time);
        }
        events
            .first()
            .map(|event| event.start_time + Duration::minutes(offset_minutes))
    }
}
