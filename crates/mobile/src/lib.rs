//! pic2acg Mobile: UniFFI bindings for iOS and Android.
//!
//! The host app creates one [`MobileBridge`] at launch and routes every
//! front-end method call through it. Handlers run on a per-instance tokio
//! runtime, so the foreign caller never blocks its UI thread and never
//! needs to provide an executor. Replies and events come back on a single
//! delivery thread owned by the bridge, in order.

uniffi::setup_scaffolding!();

use std::sync::Arc;

use pic2acg_core::env::PIC2ACG_LOG;
use pic2acg_core::gate::{Authenticator, ConfirmationReply};
use pic2acg_core::{AppCore, Dispatcher, OriginContext, Reply};
use tracing::debug;

// ---------------------------------------------------------------------------
// Types exposed to foreign code
// ---------------------------------------------------------------------------

/// Result of one invocation.
#[derive(Debug, Clone, PartialEq, uniffi::Enum)]
pub enum InvokeResult {
    /// JSON-encoded return value
    Value { json: String },
    /// Completed without a value
    Empty,
    /// Not handled here; try the next dispatch target
    Unimplemented,
    Error { message: String },
}

impl From<Reply> for InvokeResult {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Value(value) => InvokeResult::Value {
                json: value.to_string(),
            },
            Reply::Empty => InvokeResult::Empty,
            Reply::Unimplemented => InvokeResult::Unimplemented,
            Reply::Error(message) => InvokeResult::Error { message },
        }
    }
}

/// Receives the reply of [`MobileBridge::invoke`].
#[uniffi::export(with_foreign)]
pub trait InvokeCallback: Send + Sync {
    fn on_reply(&self, result: InvokeResult);
}

/// Receives published events as JSON strings.
#[uniffi::export(with_foreign)]
pub trait EventListener: Send + Sync {
    fn on_event(&self, payload: String);
}

/// Device credential prompt (biometrics, passcode) of the host platform.
#[uniffi::export(with_foreign)]
pub trait PlatformAuthenticator: Send + Sync {
    fn is_available(&self) -> bool;

    /// Show the prompt and report exactly one outcome on `handle`, from
    /// any thread.
    fn authenticate(&self, handle: Arc<ConfirmationHandle>);
}

/// Outcome reporter handed to [`PlatformAuthenticator::authenticate`].
///
/// Only the first reported outcome counts.
#[derive(uniffi::Object)]
pub struct ConfirmationHandle {
    reply: ConfirmationReply,
}

#[uniffi::export]
impl ConfirmationHandle {
    pub fn succeeded(&self) {
        self.reply.succeeded();
    }

    pub fn failed(&self) {
        self.reply.failed();
    }

    pub fn cancelled(&self) {
        self.reply.cancelled();
    }

    pub fn error(&self, message: String) {
        self.reply.error(&message);
    }
}

struct ForeignAuthenticator(Arc<dyn PlatformAuthenticator>);

impl Authenticator for ForeignAuthenticator {
    fn is_available(&self) -> bool {
        self.0.is_available()
    }

    fn authenticate(&self, reply: ConfirmationReply) {
        self.0
            .authenticate(Arc::new(ConfirmationHandle { reply }));
    }
}

// ---------------------------------------------------------------------------
// The main entry point: MobileBridge
// ---------------------------------------------------------------------------

/// Thread-safe bridge between the host app and the core.
#[derive(uniffi::Object)]
pub struct MobileBridge {
    core: Arc<AppCore>,
    dispatcher: Dispatcher,
    origin: OriginContext,
    runtime: tokio::runtime::Runtime,
}

#[uniffi::export]
impl MobileBridge {
    /// Create a bridge for the app's private files directory
    /// (`Context.filesDir` on Android, the Application Support directory
    /// on iOS).
    ///
    /// `extend_dirs` lists extra candidate data roots only the host can
    /// discover (`Context.getExternalFilesDirs` on Android); they are
    /// offered by `getExtendDirs` after the configured ones and before the
    /// default root.
    ///
    /// Pass `None` for `authenticator` on devices without a credential
    /// prompt; `verifyAuthentication` then answers `false`.
    #[uniffi::constructor]
    pub fn new(
        files_dir: String,
        extend_dirs: Vec<String>,
        authenticator: Option<Arc<dyn PlatformAuthenticator>>,
    ) -> Result<Arc<Self>, MobileError> {
        let mut core = AppCore::open(&files_dir)
            .map_err(|e| MobileError::Init(format!("{e:#}")))?
            .with_extend_dirs(extend_dirs);
        if let Some(authenticator) = authenticator {
            core = core.with_authenticator(Arc::new(ForeignAuthenticator(authenticator)));
        }
        init_logging(&core.config().logging.level);

        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .worker_threads(2)
            .max_blocking_threads(core.config().bridge.max_blocking_threads.max(1))
            .thread_name("pic2acg-worker")
            .build()
            .map_err(|e| MobileError::Init(e.to_string()))?;

        let origin =
            OriginContext::start("pic2acg-origin").map_err(|e| MobileError::Init(e.to_string()))?;

        let core = Arc::new(core);
        let dispatcher = Dispatcher::new(core.clone(), rt.handle().clone());
        debug!("Mobile bridge ready for {}", files_dir);

        Ok(Arc::new(Self {
            core,
            dispatcher,
            origin,
            runtime: rt,
        }))
    }

    /// Run `method` in the background; `callback` receives the result on
    /// the bridge's delivery thread.
    pub fn invoke(&self, method: String, params: String, callback: Arc<dyn InvokeCallback>) {
        self.dispatcher
            .invoke_on(method, params, self.origin.clone(), move |reply| {
                callback.on_reply(reply.into())
            });
    }

    /// Run `method` and wait for the result. Do not call from the UI thread.
    pub fn invoke_sync(&self, method: String, params: String) -> InvokeResult {
        self.dispatcher.invoke_blocking(&method, &params).into()
    }

    /// Route events to `listener`, replacing any previous listener.
    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.core.notifier().subscribe_on(
            self.runtime.handle(),
            self.origin.clone(),
            move |payload| listener.on_event(payload),
        );
    }

    pub fn unsubscribe(&self) {
        self.core.notifier().unsubscribe();
    }

    /// Push an event to the current listener. Returns false when nobody
    /// is listening.
    pub fn publish(&self, payload: String) -> bool {
        self.core.notifier().publish(payload)
    }

    /// Current data root.
    pub fn data_local(&self) -> String {
        self.core
            .storage()
            .current_root()
            .to_string_lossy()
            .into_owned()
    }
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_env(PIC2ACG_LOG)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    // The host may create more than one bridge per process
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum MobileError {
    #[error("Initialization error: {0}")]
    Init(String),
}
