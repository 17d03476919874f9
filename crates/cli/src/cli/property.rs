use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use serde_json::json;

use super::{Session, print_value};

#[derive(Args, Debug)]
pub struct PropertyArgs {
    #[command(subcommand)]
    pub command: PropertyCommands,
}

#[derive(Subcommand, Debug)]
pub enum PropertyCommands {
    /// Print a property
    Get {
        name: String,

        /// Printed when the property is not set
        #[arg(short, long, default_value = "")]
        default: String,
    },
    /// Set a property
    Set { name: String, value: String },
    /// Forget the stored credentials
    ClearToken,
}

pub async fn run(args: PropertyArgs, session: &Session) -> Result<()> {
    match args.command {
        PropertyCommands::Get { name, default } => {
            let params = json!({ "name": name, "defaultValue": default }).to_string();
            if let Some(value) = session.call("loadProperty", &params).await? {
                print_value(&value);
            }
        }
        PropertyCommands::Set { name, value } => {
            let params = json!({ "name": name, "value": value }).to_string();
            expect_success(session.call("saveProperty", &params).await?)?;
        }
        PropertyCommands::ClearToken => {
            expect_success(session.call("clearToken", "").await?)?;
        }
    }
    Ok(())
}

fn expect_success(reply: Option<serde_json::Value>) -> Result<()> {
    let ok = reply
        .as_ref()
        .and_then(|v| v.get("success"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !ok {
        bail!("Property store rejected the write");
    }
    Ok(())
}
