//! Speaker playback of tutor replies.
//!
//! rodio's `OutputStream` is `!Send`, so one OS thread owns the output device
//! and the sink. `Player` is a cloneable handle that sends it commands:
//!
//! ```text
//! play(wav) ─▶ Play{wav, done} ─▶ decode → sink.append ─▶ sink empty → done(Finished)
//! stop()    ─▶ Stop             ─▶ sink.stop, fresh sink  → done(Stopped)
//! ```

use std::io::Cursor;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use rodio::{Decoder, OutputStream, Sink};
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How a `play` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    Finished,
    /// Cut short by [`Player::stop`] or a newer `play`.
    Stopped,
}

enum PlayCmd {
    Play {
        wav: Vec<u8>,
        done: oneshot::Sender<Result<PlaybackEnd>>,
    },
    Stop,
}

#[derive(Clone)]
pub struct Player {
    cmd_tx: mpsc::Sender<PlayCmd>,
}

impl Player {
    /// Open the default output device on a dedicated thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Audio`] if there is no usable output device.
    pub fn new() -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<PlayCmd>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<std::result::Result<(), String>>(1);

        std::thread::Builder::new()
            .name("sogo-playback".into())
            .spawn(move || playback_thread(cmd_rx, ready_tx))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { cmd_tx }),
            Ok(Err(message)) => Err(Error::audio(message)),
            Err(_) => Err(Error::audio("playback thread exited before starting")),
        }
    }

    /// Play a WAV file and wait until it finishes or is stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if the audio cannot be decoded or the playback
    /// thread has gone away.
    pub async fn play(&self, wav: Vec<u8>) -> Result<PlaybackEnd> {
        let (done, wait) = oneshot::channel();
        self.cmd_tx
            .send(PlayCmd::Play { wav, done })
            .map_err(|_| Error::audio("playback thread is gone"))?;
        wait.await
            .map_err(|_| Error::audio("playback thread dropped the request"))?
    }

    /// Cut off whatever is playing.
    pub fn stop(&self) {
        let _ = self.cmd_tx.send(PlayCmd::Stop);
    }
}

/// Decode WAV bytes into a rodio source.
pub(crate) fn decode(wav: Vec<u8>) -> Result<Decoder<Cursor<Vec<u8>>>> {
    Decoder::new(Cursor::new(wav)).map_err(|e| Error::audio(format!("cannot decode audio: {e}")))
}

fn playback_thread(
    cmd_rx: mpsc::Receiver<PlayCmd>,
    ready_tx: mpsc::SyncSender<std::result::Result<(), String>>,
) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("cannot open audio output: {e}")));
            return;
        }
    };
    let new_sink = || Sink::try_new(&handle).map_err(|e| format!("cannot create sink: {e}"));
    let mut sink = match new_sink() {
        Ok(s) => s,
        Err(message) => {
            let _ = ready_tx.send(Err(message));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    let mut pending: Option<oneshot::Sender<Result<PlaybackEnd>>> = None;

    loop {
        if sink.empty() {
            if let Some(done) = pending.take() {
                debug!("playback: finished");
                let _ = done.send(Ok(PlaybackEnd::Finished));
            }
        }

        let cmd = match cmd_rx.recv_timeout(POLL_INTERVAL) {
            Ok(cmd) => cmd,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                sink.stop();
                break;
            }
        };

        let interrupted = matches!(cmd, PlayCmd::Stop) || pending.is_some();
        if interrupted {
            sink.stop();
            match new_sink() {
                Ok(s) => sink = s,
                Err(message) => {
                    error!("playback: {message}");
                    break;
                }
            }
            if let Some(done) = pending.take() {
                debug!("playback: stopped");
                let _ = done.send(Ok(PlaybackEnd::Stopped));
            }
        }

        if let PlayCmd::Play { wav, done } = cmd {
            match decode(wav) {
                Ok(source) => {
                    sink.append(source);
                    pending = Some(done);
                }
                Err(e) => {
                    let _ = done.send(Err(e));
                }
            }
        }
    }
}
