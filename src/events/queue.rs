use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmCommand {
    Dismiss,
    Shutdown,
}

#[derive(Clone)]
pub struct CommandBus {
    tx: mpsc::Sender<AlarmCommand>,
}

impl CommandBus {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<AlarmCommand>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    pub async fn emit(&self, command: AlarmCommand) {
        if self.tx.send(command).await.is_err() {
            debug!(?command, "command dropped, the alarm loop is gone");
        }
    }
}
