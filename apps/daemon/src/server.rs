//! Server context: startup ordering, signal handling and the admission loop.

use crate::{
    DaemonConfig, ProtocolSession,
    config::{AdmissionSettings, AuthConfig, CookieConfig, Mode, PrivilegeConfig},
};
use admission::{
    AdmissionConfig, AdmissionHandle, AdmissionLoop, BootstrapConfig, LurkTrigger, Progress,
    Strategy, TcpBinder,
};
use anyhow::{Context, Result, bail};
use auth::{
    CredentialSlot, CredentialSource, CredentialStore, XauthLocator, display_cookie_slot, passwd,
};
use privilege::{IdentityOps, PrivilegeManager, Unprivileged};
use std::{sync::Arc, time::Duration};
use tokio::signal::unix::{SignalKind, signal};

/// Load the credential store from the configured source.
///
/// No source at all yields a disabled store; any configured source that
/// fails to load is fatal at startup.
pub fn load_store(auth: &AuthConfig) -> Result<Arc<CredentialStore>> {
    let source = match (&auth.passwdfile, auth.passwd.is_empty()) {
        (Some(path), _) => CredentialSource::file(path),
        (None, false) => CredentialSource::inline(passwd::inline(&auth.passwd, &auth.view_passwd)),
        (None, true) => {
            if !auth.view_passwd.is_empty() {
                bail!("view-only passwords require a full-control password");
            }
            tracing::warn!("no passwords configured, authentication is disabled");
            return Ok(Arc::new(CredentialStore::disabled()));
        }
    };
    let store = CredentialStore::load(source).context("failed to load credentials")?;
    let snapshot = store.snapshot();
    tracing::info!(
        "loaded {} full-control and {} view-only passwords",
        snapshot.count(auth::Tier::Full),
        snapshot.count(auth::Tier::ViewOnly)
    );
    Ok(Arc::new(store))
}

/// Look up the display manager's cookie when a display is configured. A
/// missing cookie is logged and startup continues.
pub fn locate_cookie(cookie: &CookieConfig) -> Option<CredentialSlot> {
    let display_num = cookie.display?;
    let locator = match &cookie.xauthority {
        Some(path) => XauthLocator::file(path),
        None => XauthLocator::display_managers(display_num),
    };
    match display_cookie_slot(&locator, display_num) {
        Ok(slot) => Some(slot),
        Err(e) => {
            tracing::warn!("display-manager cookie not installed: {e}");
            None
        }
    }
}

/// Pin a located cookie into the loaded store.
pub fn pin_cookie(store: &CredentialStore, slot: CredentialSlot) {
    let generation = store.pin(slot);
    tracing::info!("installed display-manager cookie (generation {generation})");
}

/// Drop to the configured account and verify it.
///
/// Returns the proof marker, or `None` when no drop was requested or a
/// non-strict drop failed.
pub fn drop_privileges<O: IdentityOps>(
    manager: &mut PrivilegeManager<O>,
    config: &PrivilegeConfig,
) -> Result<Option<Unprivileged>> {
    let Some(user) = &config.user else {
        return Ok(None);
    };
    let identity = manager
        .resolve(user)
        .with_context(|| format!("failed to resolve privilege target '{user}'"))?;

    if let Err(e) = manager.drop_to(identity, config.strict) {
        if e.is_fatal() {
            return Err(e).context("failed to drop privileges");
        }
        tracing::warn!("continuing with current privileges: {e}");
        return Ok(None);
    }

    if !manager.verify_dropped() {
        if config.strict {
            bail!("privilege drop to {identity} could not be verified");
        }
        tracing::warn!("privilege drop to {identity} could not be verified, continuing");
    }
    Ok(manager.unprivileged())
}

/// Build the admission loop settings.
pub fn admission_config(settings: &AdmissionSettings) -> Result<AdmissionConfig> {
    let strategy = match settings.mode {
        Mode::Accept => Strategy::Accept,
        Mode::Bootstrap => {
            let mut bootstrap = BootstrapConfig::new(settings.http_listen);
            if let Some(path) = &settings.http_page {
                bootstrap.page = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
            }
            Strategy::Bootstrap(bootstrap)
        }
        Mode::Lurk => match &settings.lurk_file {
            Some(path) => Strategy::Lurk(LurkTrigger::Marker {
                path: path.clone(),
                poll: Duration::from_millis(settings.lurk_poll_ms),
            }),
            None => Strategy::Lurk(
                LurkTrigger::signal().context("failed to install SIGUSR1 handler")?,
            ),
        },
    };

    let mut config = AdmissionConfig::new(strategy);
    config.once = settings.once;
    config.max_failures = settings.max_failures;
    config.failure_backoff = Duration::from_millis(settings.failure_backoff_ms);
    Ok(config)
}

/// A prepared daemon: privileges dropped, credentials loaded.
pub struct Server {
    config: DaemonConfig,
    store: Arc<CredentialStore>,
    privilege: Option<Unprivileged>,
}

impl Server {
    /// Startup against the running process. See [`Server::prepare_with`].
    pub fn prepare(config: DaemonConfig) -> Result<Self> {
        Self::prepare_with(config, &mut PrivilegeManager::new())
    }

    /// Locate the display cookie while still privileged, drop privileges,
    /// then load the password list as the target account. The password
    /// file is never read with more rights than reloads will have.
    pub fn prepare_with<O: IdentityOps>(
        config: DaemonConfig,
        manager: &mut PrivilegeManager<O>,
    ) -> Result<Self> {
        let cookie = locate_cookie(&config.cookie);
        let privilege = drop_privileges(manager, &config.privilege)?;
        Self::assemble(config, cookie, privilege)
    }

    /// Prepare without touching the process identity.
    pub fn without_drop(config: DaemonConfig) -> Result<Self> {
        if config.privilege.user.is_some() {
            bail!("a privilege drop is configured; use Server::prepare");
        }
        let cookie = locate_cookie(&config.cookie);
        Self::assemble(config, cookie, None)
    }

    fn assemble(
        config: DaemonConfig,
        cookie: Option<CredentialSlot>,
        privilege: Option<Unprivileged>,
    ) -> Result<Self> {
        let store = load_store(&config.auth)?;
        if let Some(slot) = cookie {
            pin_cookie(&store, slot);
        }
        Ok(Self {
            config,
            store,
            privilege,
        })
    }

    /// The proof of the privilege drop, if one was requested and verified.
    pub fn privilege(&self) -> Option<Unprivileged> {
        self.privilege
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Start the admission loop on a background task.
    pub fn start(&self) -> Result<AdmissionHandle> {
        let admission = admission_config(&self.config.admission)?;
        let session = ProtocolSession::new(
            self.store.install(),
            self.config.auth.handshake_timeout(),
        );
        let binder = TcpBinder::new(self.config.listen.addr);
        Ok(AdmissionLoop::new(binder, session, admission, self.privilege).spawn())
    }

    /// Serve until SIGINT/SIGTERM, or until a one-shot session ends.
    /// SIGHUP forces a credential reload.
    pub async fn run(self) -> Result<()> {
        let handle = self.start()?;
        let mut progress = handle.progress();
        let mut hangup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
        let mut terminate =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

        loop {
            tokio::select! {
                _ = hangup.recv() => match self.store.reload(true) {
                    Ok(outcome) => tracing::info!("credential reload: {outcome:?}"),
                    Err(e) => tracing::warn!("credential reload failed, keeping previous passwords: {e}"),
                },
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("received shutdown signal");
                    break;
                }
                _ = terminate.recv() => {
                    tracing::info!("received SIGTERM");
                    break;
                }
                changed = progress.changed() => {
                    if changed.is_err() || *progress.borrow() == Progress::Finished {
                        handle.finished().await?;
                        tracing::info!("vncgated exiting");
                        return Ok(());
                    }
                }
            }
        }

        handle.shutdown().await?;
        tracing::info!("vncgated shut down");
        Ok(())
    }
}
