use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::events::queue::{AlarmCommand, CommandBus};

pub async fn run_stdin_listener(bus: CommandBus) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match line.trim().to_lowercase().as_str() {
                "" => {}
                "stop" | "dismiss" => bus.emit(AlarmCommand::Dismiss).await,
                "quit" | "exit" => {
                    bus.emit(AlarmCommand::Shutdown).await;
                    break;
                }
                _ => info!("WHAT?"),
            },
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "cannot read stdin, console dismissal disabled");
                break;
            }
        }
    }
}

pub async fn run_ctrl_c_listener(bus: CommandBus) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => bus.emit(AlarmCommand::Shutdown).await,
        Err(err) => warn!(error = %err, "cannot listen for ctrl-c"),
    }
}
