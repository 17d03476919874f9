use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tokio::runtime::Handle;

use pic2acg_core::{AppCore, Dispatcher, Reply};

pub mod invoke;
pub mod paths;
pub mod property;
pub mod storage;

#[derive(Parser)]
#[command(name = "pic2acg")]
#[command(author, version, about = "Drive the pic2acg core from a desktop shell", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Files directory (default data root, config and pointer file)
    #[arg(long, global = true, env = "PIC2ACG_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Invoke a bridge method directly
    Invoke(invoke::InvokeArgs),

    /// Read and write properties
    Property(property::PropertyArgs),

    /// Inspect and migrate the data root
    Storage(storage::StorageArgs),

    /// Show resolved paths
    Paths,
}

/// A core behind a dispatcher, the way a front end sees it.
pub struct Session {
    pub core: Arc<AppCore>,
    pub dispatcher: Dispatcher,
}

impl Session {
    pub fn new(core: AppCore) -> Self {
        let core = Arc::new(core);
        let dispatcher = Dispatcher::new(core.clone(), Handle::current());
        Self { core, dispatcher }
    }

    /// Invoke and turn non-value replies into errors or `None`.
    pub async fn call(&self, method: &str, params: &str) -> Result<Option<serde_json::Value>> {
        match self.dispatcher.invoke(method, params).await {
            Reply::Value(value) => Ok(Some(value)),
            Reply::Empty => Ok(None),
            Reply::Unimplemented => bail!("Unknown method '{}'", method),
            Reply::Error(message) => bail!("{}", message),
        }
    }

    /// Like [`Session::call`], printing published events to stderr while
    /// the command runs.
    pub async fn call_following_events(
        &self,
        method: &str,
        params: &str,
    ) -> Result<Option<serde_json::Value>> {
        let notifier = self.core.notifier().clone();
        let mut events = notifier.subscribe();
        let printer = tokio::spawn(async move {
            while let Some(payload) = events.next().await {
                eprintln!("{}", payload);
            }
        });

        let result = self.call(method, params).await;
        notifier.unsubscribe();
        let _ = printer.await;
        result
    }
}

/// Print a reply value; strings are printed bare.
pub fn print_value(value: &serde_json::Value) {
    match value {
        serde_json::Value::String(s) => println!("{}", s),
        other => println!("{}", other),
    }
}
