use std::sync::Arc;

use tracing::info;

use crate::clients::calendar_client::{EventSource, GoogleCalendarClient};
use crate::config::Settings;
use crate::events::queue::CommandBus;
use crate::handlers::dismiss;
use crate::service::audio::{AlarmSounder, RodioSounder};
use crate::tasks::alarm_loop::{self, Clock, SystemClock};

pub async fn run_alarm(settings: Settings) {
    let source: Arc<dyn EventSource> = Arc::new(GoogleCalendarClient::new(
        &settings.base_url,
        &settings.username,
        &settings.magic_cookie,
        settings.timezone,
    ));
    let sounder: Arc<dyn AlarmSounder> = Arc::new(RodioSounder::new(settings.sound_file.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (bus, commands) = CommandBus::new(8);
    tokio::spawn(dismiss::run_stdin_listener(bus.clone()));
    tokio::spawn(dismiss::run_ctrl_c_listener(bus.clone()));
    // The loop ends on Shutdown or once every command sender is gone.
    drop(bus);

    info!(
        timezone = %settings.timezone,
        poll_seconds = settings.poll_interval.as_secs(),
        "alarm service started"
    );
    alarm_loop::run_alarm_loop(source, sounder, clock, settings, commands).await;
}
