use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use calendarAlarm::clients::calendar_client::{EventSource, FetchError};
use calendarAlarm::config::Settings;
use calendarAlarm::events::queue::{AlarmCommand, CommandBus};
use calendarAlarm::models::event::{CalendarEvent, DayWindow};
use calendarAlarm::service::audio::{AlarmSounder, PlaybackError};
use calendarAlarm::tasks::alarm_loop::{Clock, run_alarm_loop};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::America::New_York;
use tokio::sync::Mutex as TokioMutex;
use tokio::time::{self, Instant};

struct ScriptedCalendar {
    responses: TokioMutex<VecDeque<Result<Vec<CalendarEvent>, FetchError>>>,
    windows: TokioMutex<Vec<DayWindow>>,
}

impl ScriptedCalendar {
    fn new(responses: Vec<Result<Vec<CalendarEvent>, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: TokioMutex::new(responses.into()),
            windows: TokioMutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl EventSource for ScriptedCalendar {
    async fn fetch_day(&self, window: &DayWindow) -> Result<Vec<CalendarEvent>, FetchError> {
        self.windows.lock().await.push(*window);
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

struct RecordingSounder {
    calls: TokioMutex<Vec<&'static str>>,
}

impl RecordingSounder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: TokioMutex::new(Vec::new()),
        })
    }

    async fn recorded(&self) -> Vec<&'static str> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl AlarmSounder for RecordingSounder {
    async fn start(&self) -> Result<(), PlaybackError> {
        self.calls.lock().await.push("start");
        Ok(())
    }

    async fn stop(&self) -> Result<(), PlaybackError> {
        self.calls.lock().await.push("stop");
        Ok(())
    }
}

struct TestClock {
    base: DateTime<Utc>,
    started: Instant,
}

impl TestClock {
    fn new(base: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            base,
            started: Instant::now(),
        })
    }
}

impl Clock for TestClock {
    fn now_utc(&self) -> DateTime<Utc> {
        let elapsed = Instant::now() - self.started;
        self.base
            + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

fn settings() -> Settings {
    Settings::from_props(|_| None, "alice@example.com".to_string(), "s3cret".to_string()).unwrap()
}

fn ny(hour: u32, minute: u32) -> DateTime<Utc> {
    New_York
        .with_ymd_and_hms(2026, 3, 2, hour, minute, 0)
        .unwrap()
        .with_timezone(&Utc)
}

fn event(title: &str, start_time: DateTime<Utc>) -> CalendarEvent {
    CalendarEvent {
        title: title.to_string(),
        start_time,
    }
}

fn spawn_loop(
    source: Arc<dyn EventSource>,
    sounder: Arc<dyn AlarmSounder>,
    clock: Arc<dyn Clock>,
) -> (CommandBus, tokio::task::JoinHandle<()>) {
    let (bus, commands) = CommandBus::new(8);
    let handle = tokio::spawn(run_alarm_loop(source, sounder, clock, settings(), commands));
    (bus, handle)
}

async fn settle() {
    time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn alarm_arms_from_the_first_event_then_rings_and_is_dismissed() {
    // 05:00 local; Standup at 09:00 puts the alarm at 07:20.
    let calendar = ScriptedCalendar::new(vec![Ok(vec![event("Standup", ny(9, 0))])]);
    let sounder = RecordingSounder::new();
    let clock = TestClock::new(ny(5, 0));
    let (bus, handle) = spawn_loop(calendar.clone(), sounder.clone(), clock);

    settle().await;
    assert!(sounder.recorded().await.is_empty());
    assert_eq!(
        calendar.windows.lock().await[0].date,
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    );

    time::sleep(Duration::from_secs(3 * 3600)).await;
    assert_eq!(sounder.recorded().await, vec!["start"]);

    bus.emit(AlarmCommand::Dismiss).await;
    settle().await;
    assert_eq!(sounder.recorded().await, vec!["start", "stop"]);

    bus.emit(AlarmCommand::Shutdown).await;
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn marker_event_rings_at_its_exact_time() {
    // Without the marker the 07:00 event would ring at 05:20.
    let calendar = ScriptedCalendar::new(vec![Ok(vec![
        event("Breakfast", ny(7, 0)),
        event("alarm", ny(9, 0)),
    ])]);
    let sounder = RecordingSounder::new();
    let clock = TestClock::new(ny(5, 0));
    let (bus, handle) = spawn_loop(calendar.clone(), sounder.clone(), clock);

    settle().await;
    time::sleep(Duration::from_secs(30 * 60)).await;
    assert!(sounder.recorded().await.is_empty());

    time::sleep(Duration::from_secs(4 * 3600)).await;
    assert_eq!(sounder.recorded().await, vec!["start"]);

    bus.emit(AlarmCommand::Shutdown).await;
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn moved_event_cancels_the_old_trigger_and_rearms() {
    let calendar = ScriptedCalendar::new(vec![
        Ok(vec![event("Standup", ny(9, 0))]),
        Ok(vec![event("Standup", ny(10, 0))]),
    ]);
    let sounder = RecordingSounder::new();
    let clock = TestClock::new(ny(5, 0));
    let (bus, handle) = spawn_loop(calendar.clone(), sounder.clone(), clock);

    settle().await;
    // The second poll at 06:00 moves the alarm from 07:20 to 08:20. Nothing
    // may ring when the replaced 07:20 deadline comes around.
    time::sleep(Duration::from_secs(2 * 3600 + 30 * 60)).await;
    assert!(sounder.recorded().await.is_empty());

    time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(sounder.recorded().await, vec!["start"]);

    bus.emit(AlarmCommand::Shutdown).await;
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn afternoon_polls_target_tomorrows_window() {
    let calendar = ScriptedCalendar::new(vec![Ok(Vec::new())]);
    let sounder = RecordingSounder::new();
    let clock = TestClock::new(ny(13, 0));
    let (bus, handle) = spawn_loop(calendar.clone(), sounder.clone(), clock);

    settle().await;
    let windows = calendar.windows.lock().await.clone();
    assert_eq!(windows[0].date, NaiveDate::from_ymd_opt(2026, 3, 3).unwrap());
    assert_eq!(
        windows[0].start,
        New_York.with_ymd_and_hms(2026, 3, 3, 3, 0, 0).unwrap()
    );

    bus.emit(AlarmCommand::Shutdown).await;
    handle.await.unwrap();
}
