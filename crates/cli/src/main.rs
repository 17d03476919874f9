use anyhow::Result;
use clap::Parser;

mod cli;

use cli::{Cli, Commands};
use pic2acg_core::AppCore;
use pic2acg_core::env::PIC2ACG_LOG;
use pic2acg_core::paths::Paths;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Use "warn" by default for clean output, "debug" with --verbose
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env(PIC2ACG_LOG)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let paths = match &cli.data_dir {
        Some(dir) => Paths::from_root(dir),
        None => Paths::resolve()?,
    };

    // Paths must work even when the core cannot open
    if let Commands::Paths = cli.command {
        return cli::paths::run(&paths);
    }

    let core = AppCore::open(&paths.files_dir.to_string_lossy())?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .max_blocking_threads(core.config().bridge.max_blocking_threads.max(1))
        .build()?
        .block_on(async_main(cli.command, core))
}

async fn async_main(command: Commands, core: AppCore) -> Result<()> {
    let session = cli::Session::new(core);

    match command {
        Commands::Invoke(args) => cli::invoke::run(args, &session).await,
        Commands::Property(args) => cli::property::run(args, &session).await,
        Commands::Storage(args) => cli::storage::run(args, &session).await,
        Commands::Paths => unreachable!("Paths is handled before the core opens"),
    }
}
