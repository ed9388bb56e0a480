use anyhow::Result;
use chatdriver_lib::cli::{Cli, Command};
use chatdriver_lib::commands::{self, AppContext};
use chatdriver_lib::config::{Config, PROFILES_FILE, SECRETS_FILE};
use chatdriver_lib::profiles::Catalog;
use chatdriver_lib::secrets::FileSecrets;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config_dir)?;
    config.apply_cli(&cli.overrides());
    init_logging(config.chatgpt.logging.enabled);

    if let Err(errors) = config.validate() {
        anyhow::bail!("Invalid configuration:\n  {}", errors.join("\n  "));
    }

    let catalog = Arc::new(Catalog::load(&cli.config_dir.join(PROFILES_FILE))?);

    match cli.command {
        Command::Profiles => {
            print!("{}", commands::profiles::render(&catalog));
            Ok(())
        }
        Command::Ask { prompt, .. } => {
            let ctx = context(config, catalog, &cli.config_dir)?;
            let outcome = commands::ask::run(&ctx, &prompt).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Command::Chat { .. } => {
            let ctx = context(config, catalog, &cli.config_dir)?;
            commands::chat::run(&ctx).await?;
            Ok(())
        }
    }
}

fn context(config: Config, catalog: Arc<Catalog>, dir: &std::path::Path) -> Result<AppContext> {
    let secrets = FileSecrets::load(&dir.join(SECRETS_FILE))?;
    Ok(AppContext::new(config, catalog, Arc::new(secrets)))
}

/// Logs go to stderr so `ask` output stays machine-readable.
fn init_logging(enabled: bool) {
    let filter = if enabled {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::new("off")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
