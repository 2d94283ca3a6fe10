use std::fs::File;
use std::io::BufReader;

use async_trait::async_trait;
use rodio::source::SineWave;
use rodio::{Decoder, OutputStream, Sink, Source};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio device unavailable: {0}")]
    Device(String),
    #[error("cannot play sound file {path}: {reason}")]
    SoundFile { path: String, reason: String },
    #[error("audio worker is not running")]
    WorkerStopped,
}

#[async_trait]
pub trait AlarmSounder: Send + Sync {
    async fn start(&self) -> Result<(), PlaybackError>;
    async fn stop(&self) -> Result<(), PlaybackError>;
}

enum AudioCmd {
    Start {
        reply: oneshot::Sender<Result<(), PlaybackError>>,
    },
    Stop {
        reply: oneshot::Sender<Result<(), PlaybackError>>,
    },
}

// Rodio output streams are not Send, so all audio state lives on a dedicated
// thread and this handle only passes commands over a channel.
pub struct RodioSounder {
    tx: mpsc::Sender<AudioCmd>,
}

impl RodioSounder {
    pub fn new(sound_file: Option<String>) -> Self {
        let (tx, rx) = mpsc::channel(4);
        std::thread::spawn(move || audio_thread(rx, sound_file));
        Self { tx }
    }

    async fn send(&self, cmd: AudioCmd, reply: oneshot::Receiver<Result<(), PlaybackError>>) -> Result<(), PlaybackError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| PlaybackError::WorkerStopped)?;
        reply.await.map_err(|_| PlaybackError::WorkerStopped)?
    }
}

#[async_trait]
impl AlarmSounder for RodioSounder {
    async fn start(&self) -> Result<(), PlaybackError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(AudioCmd::Start { reply: reply_tx }, reply_rx).await
    }

    async fn stop(&self) -> Result<(), PlaybackError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(AudioCmd::Stop { reply: reply_tx }, reply_rx).await
    }
}

fn audio_thread(mut rx: mpsc::Receiver<AudioCmd>, sound_file: Option<String>) {
    // The stream must outlive the sink or playback dies silently.
    let mut playing: Option<(OutputStream, Sink)> = None;
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            AudioCmd::Start { reply } => {
                let result = if playing.is_some() {
                    Ok(())
                } else {
                    match begin_playback(sound_file.as_deref()) {
                        Ok(stream_and_sink) => {
                            playing = Some(stream_and_sink);
                            Ok(())
                        }
                        Err(err) => Err(err),
                    }
                };
                let _ = reply.send(result);
            }
            AudioCmd::Stop { reply } => {
                if let Some((_, sink)) = playing.take() {
                    sink.stop();
                }
                let _ = reply.send(Ok(()));
            }
        }
    }
}

fn begin_playback(sound_file: Option<&str>) -> Result<(OutputStream, Sink), PlaybackError> {
    // Decode before grabbing the device, so a bad file fails the same way
    // with or without an output device present.
    let decoded = match sound_file {
        Some(path) => Some(open_sound_file(path)?),
        None => None,
    };
    let (stream, handle) =
        OutputStream::try_default().map_err(|e| PlaybackError::Device(e.to_string()))?;
    let sink = Sink::try_new(&handle).map_err(|e| PlaybackError::Device(e.to_string()))?;
    match decoded {
        Some(source) => sink.append(source.repeat_infinite()),
        None => sink.append(alarm_tone()),
    }
    Ok((stream, sink))
}

fn open_sound_file(path: &str) -> Result<Decoder<BufReader<File>>, PlaybackError> {
    let sound_file = |reason: String| PlaybackError::SoundFile {
        path: path.to_string(),
        reason,
    };
    let file = File::open(path).map_err(|e| sound_file(e.to_string()))?;
    Decoder::new(BufReader::new(file)).map_err(|e| sound_file(e.to_string()))
}

fn alarm_tone() -> impl Source<Item = f32> + Send {
    SineWave::new(880.0).amplify(0.25)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sound_files_fail_before_the_device_is_touched() {
        match begin_playback(Some("/no/such/alarm.wav")) {
            Err(PlaybackError::SoundFile { .. }) => {}
            Err(other) => panic!("got {other:?}"),
            Ok(_) => panic!("a missing file should not start playback"),
        }
    }

    #[test]
    fn unrecognized_sound_files_are_playback_errors() {
        let path = std::env::temp_dir().join(format!(
            "calendar-alarm-not-audio-{}.txt",
            std::process::id()
        ));
        std::fs::write(&path, "this is not audio").unwrap();
        let result = open_sound_file(path.to_str().unwrap());
        std::fs::remove_file(&path).ok();
        match result {
            Err(PlaybackError::SoundFile { .. }) => {}
            Err(other) => panic!("got {other:?}"),
            Ok(_) => panic!("plain text should not decode"),
        }
    }
}
