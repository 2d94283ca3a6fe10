use std::future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::clients::calendar_client::{EventSource, FetchError};
use crate::config::Settings;
use crate::events::queue::AlarmCommand;
use crate::models::event::{CalendarEvent, DayWindow};
use crate::service::audio::AlarmSounder;
use crate::service::resolver::AlarmTimeResolver;

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Armed,
    Ringing,
}

#[derive(Debug)]
pub struct ArmedTrigger {
    fires_at: DateTime<Utc>,
    deadline: Instant,
}

impl ArmedTrigger {
    fn new(fires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let wait = (fires_at - now).to_std().unwrap_or(std::time::Duration::ZERO);
        Self {
            fires_at,
            deadline: Instant::now() + wait,
        }
    }

    pub fn fires_at(&self) -> DateTime<Utc> {
        self.fires_at
    }
}

// Mutated only by the loop that owns it. Replacing `armed` drops the old
// deadline before the next select pass can poll it, which is the cancellation.
#[derive(Debug, Default)]
pub struct SchedulerState {
    last_known_alarm: Option<DateTime<Utc>>,
    armed: Option<ArmedTrigger>,
    ringing: bool,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        if self.ringing {
            Phase::Ringing
        } else if self.armed.is_some() {
            Phase::Armed
        } else {
            Phase::Idle
        }
    }

    pub fn armed_at(&self) -> Option<DateTime<Utc>> {
        self.armed.as_ref().map(|trigger| trigger.fires_at)
    }

    pub fn last_known_alarm(&self) -> Option<DateTime<Utc>> {
        self.last_known_alarm
    }

    pub fn is_ringing(&self) -> bool {
        self.ringing
    }

    fn deadline(&self) -> Option<Instant> {
        self.armed.as_ref().map(|trigger| trigger.deadline)
    }

    // The last known alarm time stays put until a later poll supersedes it.
    pub fn begin_ringing(&mut self) -> Option<ArmedTrigger> {
        let fired = self.armed.take();
        if fired.is_some() {
            self.ringing = true;
        }
        fired
    }

    pub fn end_ringing(&mut self) {
        self.ringing = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Armed { fires_at: DateTime<Utc> },
    Unchanged,
    AlreadyPassed,
    NoEvents,
}

pub fn reconcile(
    state: &mut SchedulerState,
    candidate: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> TickOutcome {
    let Some(candidate) = candidate else {
        return TickOutcome::NoEvents;
    };
    if candidate < now {
        return TickOutcome::AlreadyPassed;
    }
    if state.armed.is_some() {
        if let Some(last) = state.last_known_alarm {
            if same_minute(last, candidate) {
                return TickOutcome::Unchanged;
            }
        }
    }
    state.armed = Some(ArmedTrigger::new(candidate, now));
    state.last_known_alarm = Some(candidate);
    TickOutcome::Armed { fires_at: candidate }
}

// The feed reports minute-resolution times; anything finer is jitter, not a
// moved event.
fn same_minute(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.timestamp() / 60 == b.timestamp() / 60
}

pub fn poll_window(now: DateTime<Utc>, settings: &Settings) -> DayWindow {
    let now_local = now.with_timezone(&settings.timezone);
    let mut target = now_local.date_naive();
    if now_local.hour() >= settings.day_rollover_hour {
        target = target + Duration::days(1);
    }
    DayWindow::for_date(target, settings.timezone)
}

async fn fire_when_due(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => future::pending().await,
    }
}

pub async fn run_alarm_loop(
    source: Arc<dyn EventSource>,
    sounder: Arc<dyn AlarmSounder>,
    clock: Arc<dyn Clock>,
    settings: Settings,
    mut commands: mpsc::Receiver<AlarmCommand>,
) {
    let mut state = SchedulerState::new();
    let (fetch_tx, mut fetch_rx) = mpsc::channel::<Result<Vec<CalendarEvent>, FetchError>>(1);
    let mut poll = time::interval(settings.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut fetch_in_flight = false;

    loop {
        let deadline = state.deadline();
        tokio::select! {
            _ = poll.tick() => {
                if fetch_in_flight {
                    info!("previous calendar fetch still running, skipping this poll");
                    continue;
                }
                let now = clock.now_utc();
                let window = poll_window(now, &settings);
                info!(date = %window.date, "checking calendar");
                fetch_in_flight = true;
                let source = source.clone();
                let fetch_tx = fetch_tx.clone();
                tokio::spawn(async move {
                    let result = source.fetch_day(&window).await;
                    let _ = fetch_tx.send(result).await;
                });
            }
            Some(result) = fetch_rx.recv() => {
                fetch_in_flight = false;
                match result {
                    Ok(events) => {
                        let now = clock.now_utc();
                        let candidate = AlarmTimeResolver::resolve(
                            &events,
                            &settings.marker_title,
                            settings.offset_minutes,
                        );
                        match reconcile(&mut state, candidate, now) {
                            TickOutcome::Armed { fires_at } => {
                                info!(alarm = %fires_at.with_timezone(&settings.timezone), "alarm set");
                            }
                            TickOutcome::Unchanged => {
                                if let Some(at) = state.armed_at() {
                                    info!(alarm = %at.with_timezone(&settings.timezone), "alarm already set");
                                }
                            }
                            TickOutcome::AlreadyPassed => {
                                info!("alarm time for today already passed");
                            }
                            TickOutcome::NoEvents => {
                                info!("no events in the window, nothing to schedule");
                            }
                        }
                    }
                    Err(err) => {
                        warn!(
                            error = %err,
                            last_known = ?state.last_known_alarm(),
                            "calendar fetch failed, keeping the current schedule"
                        );
                    }
                }
            }
            () = fire_when_due(deadline) => {
                if let Some(trigger) = state.begin_ringing() {
                    info!(
                        alarm = %trigger.fires_at().with_timezone(&settings.timezone),
                        "alarm ringing, type 'stop' to dismiss"
                    );
                    if let Err(err) = sounder.start().await {
                        warn!(error = %err, "alarm playback failed, the alarm still counts as rung");
                    }
                }
            }
            command = commands.recv() => match command {
                Some(AlarmCommand::Dismiss) => {
                    if state.is_ringing() {
                        state.end_ringing();
                        if let Err(err) = sounder.stop().await {
                            warn!(error = %err, "stopping alarm audio failed");
                        }
                        info!(phase = ?state.phase(), "alarm dismissed");
                    } else {
                        info!("nothing is ringing right now");
                    }
                }
                Some(AlarmCommand::Shutdown) | None => {
                    if state.is_ringing() {
                        let _ = sounder.stop().await;
                    }
                    info!("alarm service stopping");
                    break;
                }
            },
        }
    }
}
