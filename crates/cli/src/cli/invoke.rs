use anyhow::Result;
use clap::Args;

use super::{Session, print_value};

#[derive(Args, Debug)]
pub struct InvokeArgs {
    /// Method name, e.g. `getProxy` or `loadProperty`
    pub method: String,

    /// Parameter document (JSON for most methods, the raw value for setters)
    #[arg(default_value = "")]
    pub params: String,
}

pub async fn run(args: InvokeArgs, session: &Session) -> Result<()> {
    if let Some(value) = session
        .call_following_events(&args.method, &args.params)
        .await?
    {
        print_value(&value);
    }
    Ok(())
}
