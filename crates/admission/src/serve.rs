//! The admission loop.

use crate::{
    AdmissionError, AdmissionState, Attempt, Event, Progress,
    attempt::Ledger,
    bootstrap::{self, BootstrapConfig},
    listener::{Acceptor, Binder},
    lurk::LurkTrigger,
};
use privilege::Unprivileged;
use std::{
    future::Future,
    sync::{Arc, atomic::Ordering},
    time::Duration,
};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::{JoinHandle, JoinSet},
};

/// How the loop waits for peers.
#[derive(Debug)]
pub enum Strategy {
    /// Listen immediately and accept peers as they come.
    Accept,
    /// Listen immediately and also serve a bootstrap page over HTTP.
    Bootstrap(BootstrapConfig),
    /// Hold no listener until the trigger fires, then run exactly one
    /// admission cycle and go back to lurking.
    Lurk(LurkTrigger),
}

/// Admission loop settings.
#[derive(Debug)]
pub struct AdmissionConfig {
    pub strategy: Strategy,
    /// Exit after the first connection closes.
    pub once: bool,
    /// Consecutive rejections before accepts are delayed. Zero disables.
    pub max_failures: u32,
    /// Delay before handing a new peer to the handler while over
    /// `max_failures`.
    pub failure_backoff: Duration,
    /// Pause after a transient accept error.
    pub accept_pause: Duration,
}

impl AdmissionConfig {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            once: false,
            max_failures: 5,
            failure_backoff: Duration::from_secs(2),
            accept_pause: Duration::from_millis(50),
        }
    }
}

/// Runs the protocol on an accepted connection.
///
/// Implementations call [`Attempt::handshake_started`] when the handshake
/// begins and [`Attempt::decided`] with the gate's decision. Returning ends
/// the connection.
pub trait SessionHandler<S>: Send + Sync + 'static {
    fn handle(&self, stream: S, attempt: Attempt) -> impl Future<Output = ()> + Send;
}

/// Waits for peers and hands each one to a [`SessionHandler`].
pub struct AdmissionLoop<B, H> {
    binder: B,
    handler: Arc<H>,
    config: AdmissionConfig,
    ledger: Ledger,
    privilege: Option<Unprivileged>,
}

impl<B, H> AdmissionLoop<B, H>
where
    B: Binder,
    H: SessionHandler<<B::Acceptor as Acceptor>::Stream>,
{
    /// `privilege` is the proof that the process dropped to its configured
    /// identity, or `None` when no drop was requested.
    pub fn new(
        binder: B,
        handler: H,
        config: AdmissionConfig,
        privilege: Option<Unprivileged>,
    ) -> Self {
        Self {
            binder,
            handler: Arc::new(handler),
            config,
            ledger: Ledger::default(),
            privilege,
        }
    }

    /// Observe lifecycle checkpoints.
    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.ledger.progress.subscribe()
    }

    /// Run on a background task.
    pub fn spawn(self) -> AdmissionHandle {
        let progress = self.progress();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join = tokio::spawn(self.run(shutdown_rx));
        AdmissionHandle {
            progress,
            shutdown_tx: Some(shutdown_tx),
            join,
        }
    }

    /// Run until shutdown, until a one-shot session closes, or until a
    /// fatal error. A handshake in progress at shutdown is allowed to reach
    /// its decision; sessions are then aborted.
    pub async fn run(self, mut shutdown: oneshot::Receiver<()>) -> Result<(), AdmissionError> {
        let Self {
            binder,
            handler,
            config,
            ledger,
            privilege,
        } = self;
        match &privilege {
            Some(proof) => tracing::info!("admission running as {}", proof.identity()),
            None => tracing::info!("admission running with unchanged privileges"),
        }

        let (mut trigger, bootstrap_settings) = match config.strategy {
            Strategy::Accept => (None, None),
            Strategy::Bootstrap(settings) => (None, Some(settings)),
            Strategy::Lurk(trigger) => (Some(trigger), None),
        };
        let single = config.once || trigger.is_some();

        let mut listener = match trigger {
            Some(_) => None,
            None => Some(bind(&binder, &ledger).await?),
        };

        let bootstrap_port = match (&bootstrap_settings, &listener) {
            (Some(_), Some(acceptor)) => Some(
                acceptor
                    .local_addr()
                    .map_err(|source| AdmissionError::Bind {
                        target: binder.target(),
                        source,
                    })?
                    .port(),
            ),
            _ => None,
        };
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let responder = match (bootstrap_settings, bootstrap_port) {
            (Some(settings), Some(port)) => {
                let responder = bootstrap::start(&settings, port, events_tx).await?;
                ledger
                    .progress
                    .report(Progress::BootstrapReady(responder.addr));
                Some(responder)
            }
            _ => None,
        };

        let mut sessions = JoinSet::new();
        let mut live: Vec<Attempt> = Vec::new();
        let mut next_id = 0u64;

        let result = loop {
            if listener.is_none() {
                let Some(trigger) = trigger.as_mut() else {
                    break Ok(());
                };
                ledger.progress.report(Progress::Lurking);
                tracing::info!("lurking until triggered");
                tokio::select! {
                    fired = trigger.wait() => {
                        if let Err(e) = fired {
                            break Err(AdmissionError::Trigger(e));
                        }
                    }
                    _ = &mut shutdown => break Ok(()),
                }
                match bind(&binder, &ledger).await {
                    Ok(acceptor) => listener = Some(acceptor),
                    Err(e) => break Err(e),
                }
            }
            let Some(acceptor) = listener.as_mut() else {
                break Ok(());
            };

            next_id += 1;
            let attempt = Attempt::new(next_id, ledger.clone());
            if let Err(e) = attempt.advance(Event::Start) {
                break Err(e);
            }

            let accepted = loop {
                tokio::select! {
                    accepted = acceptor.accept() => match accepted {
                        Ok(pair) => break Some(pair),
                        Err(e) => {
                            tracing::error!("failed to accept connection: {e}");
                            let _ = attempt.advance(Event::AcceptFailed);
                            tokio::time::sleep(config.accept_pause).await;
                        }
                    },
                    Some(request) = events.recv() => {
                        tracing::info!("served bootstrap page for {}", request.path);
                        let _ = attempt.advance(Event::BootstrapServed);
                    }
                    Some(joined) = sessions.join_next() => {
                        reap(joined);
                        live.retain(|a| a.state() != AdmissionState::Closed);
                    }
                    _ = &mut shutdown => break None,
                }
            };
            let Some((stream, peer)) = accepted else {
                break Ok(());
            };

            let failures = ledger.failures.load(Ordering::Relaxed);
            if config.max_failures > 0 && failures >= config.max_failures {
                tracing::warn!(
                    "{failures} consecutive rejections, delaying {peer} by {:?}",
                    config.failure_backoff
                );
                tokio::select! {
                    _ = tokio::time::sleep(config.failure_backoff) => {}
                    _ = &mut shutdown => break Ok(()),
                }
            }

            attempt.accepted(peer);
            ledger.progress.report(Progress::PeerAccepted);
            tracing::info!("attempt {}: accepted connection from {peer}", attempt.id());
            if single {
                listener = None;
            }

            live.push(attempt.clone());
            let handler = Arc::clone(&handler);
            sessions.spawn(async move {
                handler.handle(stream, attempt.clone()).await;
                attempt.finish();
            });

            if single {
                tokio::select! {
                    _ = join_all(&mut sessions) => {}
                    _ = &mut shutdown => break Ok(()),
                }
                live.clear();
                if config.once {
                    tracing::info!("one-shot session closed");
                    break Ok(());
                }
            }
        };

        drop(listener);
        if let Some(responder) = responder {
            responder.shutdown().await;
        }
        for attempt in &live {
            attempt.settled().await;
        }
        sessions.abort_all();
        join_all(&mut sessions).await;
        ledger.progress.report(Progress::Finished);
        tracing::info!("admission loop stopped");
        result
    }
}

/// Handle to a spawned [`AdmissionLoop`].
pub struct AdmissionHandle {
    progress: watch::Receiver<Progress>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<Result<(), AdmissionError>>,
}

impl AdmissionHandle {
    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.progress.clone()
    }

    /// Ask the loop to stop and wait for it. Dropping the handle without
    /// calling this also stops the loop.
    pub async fn shutdown(mut self) -> Result<(), AdmissionError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.join.await?
    }

    /// Wait for the loop to stop on its own.
    pub async fn finished(self) -> Result<(), AdmissionError> {
        let Self {
            join, shutdown_tx, ..
        } = self;
        let result = join.await;
        drop(shutdown_tx);
        result?
    }
}

async fn bind<B: Binder>(binder: &B, ledger: &Ledger) -> Result<B::Acceptor, AdmissionError> {
    let acceptor = binder
        .bind()
        .await
        .map_err(|source| AdmissionError::Bind {
            target: binder.target(),
            source,
        })?;
    match acceptor.local_addr() {
        Ok(addr) => {
            tracing::info!("listening on {addr}");
            ledger.progress.report(Progress::ListenerReady(addr));
        }
        Err(e) => tracing::warn!("listener has no local address: {e}"),
    }
    Ok(acceptor)
}

async fn join_all(sessions: &mut JoinSet<()>) {
    while let Some(joined) = sessions.join_next().await {
        reap(joined);
    }
}

fn reap(joined: Result<(), tokio::task::JoinError>) {
    match joined {
        Err(e) if !e.is_cancelled() => tracing::error!("session task failed: {e}"),
        _ => {}
    }
}
