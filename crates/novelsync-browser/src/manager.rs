use crate::{Error, Result};
use async_trait::async_trait;
use std::ops::Deref;
use std::time::Duration;
use tokio::sync::{watch, Mutex, MutexGuard};

/// A running browser session owned by [`BrowserManager`]
#[async_trait]
pub trait LiveSession: Send + Sync + 'static {
    /// Cheap introspection call; `false` means the session is unusable
    async fn is_alive(&self) -> bool;

    /// Tear the session down. Errors are informational only.
    async fn shutdown(self) -> Result<()>;
}

/// Starts sessions and logs them in
#[async_trait]
pub trait SessionLauncher: Send + Sync + 'static {
    type Session: LiveSession;

    /// Launch a session with its resource-saving configuration applied
    async fn launch(&self) -> Result<Self::Session>;

    async fn authenticate(&self, session: &Self::Session) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Closed,
    Starting,
    Ready,
}

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Budget for launch plus login
    pub startup_timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(120),
            probe_timeout: Duration::from_secs(10),
        }
    }
}

/// Owns the single browser session of the process.
///
/// [`BrowserManager::acquire`] hands out a [`SessionLease`] that holds the
/// manager's lock until it is released or dropped, so the session is shared
/// between callers but never used by two of them at once, and at most one
/// startup runs at a time.
pub struct BrowserManager<L: SessionLauncher> {
    launcher: L,
    config: ManagerConfig,
    slot: Mutex<Option<L::Session>>,
    phase: watch::Sender<SessionPhase>,
}

impl<L: SessionLauncher> BrowserManager<L> {
    pub fn new(launcher: L, config: ManagerConfig) -> Self {
        let (phase, _) = watch::channel(SessionPhase::Closed);
        Self {
            launcher,
            config,
            slot: Mutex::new(None),
            phase,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Return the live session, starting one if there is none or the current
    /// one fails its liveness probe. Startup failures are returned as-is.
    pub async fn acquire(&self) -> Result<SessionLease<'_, L::Session>> {
        let mut slot = self.slot.lock().await;

        if let Some(session) = slot.as_ref() {
            let alive = tokio::time::timeout(self.config.probe_timeout, session.is_alive())
                .await
                .unwrap_or(false);
            if alive {
                tracing::debug!("Reusing live browser session");
                return Ok(SessionLease {
                    slot,
                    phase: &self.phase,
                });
            }

            tracing::warn!("Browser session failed its liveness probe, restarting");
            if let Some(dead) = slot.take() {
                shutdown_quietly(dead).await;
            }
            self.phase.send_replace(SessionPhase::Closed);
        }

        self.phase.send_replace(SessionPhase::Starting);
        tracing::info!("Launching browser session");

        let started = tokio::time::timeout(self.config.startup_timeout, self.start()).await;
        match started {
            Ok(Ok(session)) => {
                *slot = Some(session);
                self.phase.send_replace(SessionPhase::Ready);
                tracing::info!("Browser session ready");
                Ok(SessionLease {
                    slot,
                    phase: &self.phase,
                })
            }
            Ok(Err(e)) => {
                self.phase.send_replace(SessionPhase::Closed);
                tracing::error!("Browser startup failed: {}", e);
                Err(e)
            }
            Err(_) => {
                self.phase.send_replace(SessionPhase::Closed);
                Err(Error::Timeout {
                    what: "browser startup".to_string(),
                    seconds: self.config.startup_timeout.as_secs(),
                })
            }
        }
    }

    async fn start(&self) -> Result<L::Session> {
        let session = self.launcher.launch().await?;
        if let Err(e) = self.launcher.authenticate(&session).await {
            shutdown_quietly(session).await;
            return Err(e);
        }
        Ok(session)
    }

    /// Tear down the session if there is one. Waits for any lease to finish.
    pub async fn release(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(session) = slot.take() {
            tracing::info!("Closing browser session");
            shutdown_quietly(session).await;
        }
        self.phase.send_replace(SessionPhase::Closed);
    }
}

async fn shutdown_quietly<S: LiveSession>(session: S) {
    if let Err(e) = session.shutdown().await {
        tracing::warn!("Error while closing browser: {}", e);
    }
}

/// Exclusive use of the live session.
///
/// Dropping the lease keeps the session for the next caller (it is probed
/// again on acquisition); [`SessionLease::release`] tears it down.
pub struct SessionLease<'a, S: LiveSession> {
    slot: MutexGuard<'a, Option<S>>,
    phase: &'a watch::Sender<SessionPhase>,
}

impl<S: LiveSession> SessionLease<'_, S> {
    pub async fn release(mut self) {
        if let Some(session) = self.slot.take() {
            tracing::debug!("Releasing browser session");
            shutdown_quietly(session).await;
        }
        self.phase.send_replace(SessionPhase::Closed);
    }
}

impl<S: LiveSession> Deref for SessionLease<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.slot
            .as_ref()
            .expect("a lease is only created around a live session")
    }
}
