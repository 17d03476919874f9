//! Runs commands off the caller's thread and hands results back.
//!
//! Every invocation executes on the runtime's blocking pool, which grows on
//! demand: handlers do file moves and wait on platform prompts, and a slow
//! one must never hold up another. Handler errors and panics are converted
//! to [`Reply::Error`] here, so handlers can simply use `?`.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::runtime::Handle;
use tracing::{debug, error};

use crate::command::Reply;
use crate::origin::OriginContext;

/// Something that answers named commands.
///
/// Returning `Reply::Unimplemented` passes the request on to the next
/// handler in a [`HandlerChain`].
pub trait CommandHandler: Send + Sync {
    fn handle(&self, method: &str, params: &str) -> Result<Reply>;
}

/// Tries handlers in order; the first answer that is not `Unimplemented`
/// wins.
#[derive(Default, Clone)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn CommandHandler>>,
}

impl HandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl CommandHandler for HandlerChain {
    fn handle(&self, method: &str, params: &str) -> Result<Reply> {
        for handler in &self.handlers {
            match handler.handle(method, params)? {
                Reply::Unimplemented => continue,
                reply => return Ok(reply),
            }
        }
        Ok(Reply::Unimplemented)
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    handler: Arc<dyn CommandHandler>,
    runtime: Handle,
}

impl Dispatcher {
    pub fn new(handler: Arc<dyn CommandHandler>, runtime: Handle) -> Self {
        Self { handler, runtime }
    }

    /// Execute `method` on a worker and await its reply.
    pub async fn invoke(&self, method: &str, params: &str) -> Reply {
        let handler = Arc::clone(&self.handler);
        let task_method = method.to_string();
        let params = params.to_string();
        let started = Instant::now();

        let joined = self
            .runtime
            .spawn_blocking(move || handler.handle(&task_method, &params))
            .await;

        let reply = match joined {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                error!("Command '{}' failed: {:#}", method, e);
                Reply::Error(format!("{:#}", e))
            }
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic());
                error!("Command '{}' panicked: {}", method, message);
                Reply::Error(message)
            }
            Err(e) => Reply::Error(e.to_string()),
        };

        debug!(
            "Command '{}' finished in {}ms",
            method,
            started.elapsed().as_millis()
        );
        reply
    }

    /// Execute `method` without blocking the caller; `on_reply` runs on
    /// `origin` once the handler is done.
    pub fn invoke_on<F>(&self, method: String, params: String, origin: OriginContext, on_reply: F)
    where
        F: FnOnce(Reply) + Send + 'static,
    {
        let dispatcher = self.clone();
        self.runtime.spawn(async move {
            let reply = dispatcher.invoke(&method, &params).await;
            if !origin.post(move || on_reply(reply)) {
                error!("Origin context gone, dropping reply to '{}'", method);
            }
        });
    }

    /// Blocking form for callers that are not on the runtime.
    ///
    /// Must not be called from inside an async task.
    pub fn invoke_blocking(&self, method: &str, params: &str) -> Reply {
        self.runtime.block_on(self.invoke(method, params))
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "command handler panicked".to_string()
    }
}
