//! Bridges the callback-based platform confirmation prompt (biometrics)
//! into a bounded blocking wait for synchronous command handlers.

use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

/// One-shot reply slot handed to the platform prompt.
///
/// Every outcome path pushes a single boolean; only the first one is ever
/// read, later pushes are discarded.
#[derive(Clone)]
pub struct ConfirmationReply {
    tx: SyncSender<bool>,
}

impl ConfirmationReply {
    pub fn succeeded(&self) {
        self.resolve(true);
    }

    pub fn failed(&self) {
        self.resolve(false);
    }

    pub fn cancelled(&self) {
        debug!("Confirmation cancelled by user");
        self.resolve(false);
    }

    pub fn error(&self, message: &str) {
        warn!("Confirmation prompt error: {}", message);
        self.resolve(false);
    }

    fn resolve(&self, confirmed: bool) {
        // Full: an earlier outcome already won. Disconnected: caller gave up.
        let _ = self.tx.try_send(confirmed);
    }
}

/// Platform confirmation capability.
pub trait Authenticator: Send + Sync {
    /// Whether the running platform can show the prompt at all.
    fn is_available(&self) -> bool;

    /// Start the prompt; report the outcome through `reply` from any thread.
    fn authenticate(&self, reply: ConfirmationReply);
}

/// Authenticator for platforms without a confirmation prompt.
pub struct UnavailableAuthenticator;

impl Authenticator for UnavailableAuthenticator {
    fn is_available(&self) -> bool {
        false
    }

    fn authenticate(&self, reply: ConfirmationReply) {
        reply.failed();
    }
}

pub struct ConfirmationGate {
    authenticator: Arc<dyn Authenticator>,
    timeout: Duration,
}

impl ConfirmationGate {
    pub fn new(authenticator: Arc<dyn Authenticator>, timeout: Duration) -> Self {
        Self {
            authenticator,
            timeout,
        }
    }

    /// Block for the configured timeout.
    pub fn confirm(&self) -> bool {
        self.await_confirmation(self.timeout)
    }

    /// Run the prompt and block until it resolves or `timeout` elapses.
    ///
    /// Resolves to false immediately when the capability is unavailable.
    pub fn await_confirmation(&self, timeout: Duration) -> bool {
        if !self.authenticator.is_available() {
            debug!("Confirmation prompt unavailable on this platform");
            return false;
        }

        let (tx, rx) = mpsc::sync_channel(1);
        self.authenticator.authenticate(ConfirmationReply { tx });

        match rx.recv_timeout(timeout) {
            Ok(confirmed) => confirmed,
            Err(RecvTimeoutError::Timeout) => {
                warn!("Confirmation timed out after {:?}", timeout);
                false
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Confirmation prompt dropped without an outcome");
                false
            }
        }
    }
}
