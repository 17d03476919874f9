use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use serde_json::json;
use tracing::debug;

use super::{Session, print_value};

#[derive(Args, Debug)]
pub struct StorageArgs {
    #[command(subcommand)]
    pub command: StorageCommands,
}

#[derive(Subcommand, Debug)]
pub enum StorageCommands {
    /// Print the current data root
    Current,
    /// List candidate data roots
    Candidates,
    /// Move all data to a new root (omit the path for the default root)
    Migrate {
        path: Option<PathBuf>,
    },
    /// Offer another directory as a candidate data root
    AddRoot {
        path: PathBuf,
    },
}

pub async fn run(args: StorageArgs, session: &Session) -> Result<()> {
    match args.command {
        StorageCommands::Current => {
            if let Some(value) = session.call("dataLocal", "").await? {
                print_value(&value);
            }
        }
        StorageCommands::Candidates => {
            if let Some(serde_json::Value::String(dirs)) =
                session.call("getExtendDirs", "").await?
            {
                for dir in dirs.split(pic2acg_core::storage::EXTEND_DIRS_DELIMITER) {
                    println!("{}", dir);
                }
            }
        }
        StorageCommands::Migrate { path } => migrate(path, session).await?,
        StorageCommands::AddRoot { path } => add_root(path, session)?,
    }
    Ok(())
}

async fn migrate(path: Option<PathBuf>, session: &Session) -> Result<()> {
    let path = path
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    debug!("Migrating data root to '{}'", path);

    session
        .call_following_events("migrate", &json!({ "path": path }).to_string())
        .await?;

    if let Some(value) = session.call("dataLocal", "").await? {
        print!("Data root: ");
        print_value(&value);
    }
    Ok(())
}

fn add_root(path: PathBuf, session: &Session) -> Result<()> {
    if !path.is_absolute() {
        bail!("Data roots must be absolute paths: {}", path.display());
    }
    let dir = path.to_string_lossy().into_owned();

    let mut config = session.core.config().clone();
    if config.storage.extend_dirs.contains(&dir) {
        println!("Already a candidate: {}", dir);
        return Ok(());
    }
    config.storage.extend_dirs.push(dir);
    config.save()?;
    println!("Saved {}", config.paths.config_file().display());
    Ok(())
}
