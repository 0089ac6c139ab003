//! Lurk triggers: what wakes a lurking daemon up.

use std::{io, path::PathBuf, time::Duration};
use tokio::{
    signal::unix::{Signal, SignalKind, signal},
    sync::mpsc,
};

/// Default marker file poll interval.
pub const DEFAULT_MARKER_POLL: Duration = Duration::from_millis(500);

/// Something that fires once per admission cycle while lurking.
#[derive(Debug)]
pub enum LurkTrigger {
    /// Fires when `path` appears. The file is removed so the next cycle
    /// waits for it to be created again.
    Marker { path: PathBuf, poll: Duration },
    /// Fires on SIGUSR1.
    Signal(Signal),
    /// Fires on every message. A closed channel never fires again.
    Channel(mpsc::Receiver<()>),
}

impl LurkTrigger {
    pub fn marker(path: impl Into<PathBuf>) -> Self {
        Self::Marker {
            path: path.into(),
            poll: DEFAULT_MARKER_POLL,
        }
    }

    /// Register the SIGUSR1 handler now, so signals sent before the first
    /// wait are not lost to the default disposition.
    pub fn signal() -> io::Result<Self> {
        Ok(Self::Signal(signal(SignalKind::user_defined1())?))
    }

    /// Wait for the trigger to fire.
    ///
    /// A marker that appears but cannot be removed is an error rather than
    /// a firing, since it would fire again on every later cycle.
    pub async fn wait(&mut self) -> io::Result<()> {
        match self {
            Self::Marker { path, poll } => loop {
                if path.exists() {
                    match std::fs::remove_file(&*path) {
                        Ok(()) => {
                            tracing::info!("lurk marker {} appeared", path.display());
                            return Ok(());
                        }
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(e) => {
                            tracing::error!("failed to consume lurk marker {}: {e}", path.display());
                            return Err(e);
                        }
                    }
                }
                tokio::time::sleep(*poll).await;
            },
            Self::Signal(signal) => {
                if signal.recv().await.is_none() {
                    std::future::pending::<()>().await;
                }
                tracing::info!("lurk triggered by SIGUSR1");
                Ok(())
            }
            Self::Channel(rx) => {
                if rx.recv().await.is_none() {
                    std::future::pending::<()>().await;
                }
                tracing::info!("lurk triggered");
                Ok(())
            }
        }
    }
}
