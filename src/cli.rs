use crate::config::CliOverrides;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "chatdriver")]
#[command(about = "Drive web chat assistants from the command line", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Directory holding settings.toml, profiles.toml and .secrets.toml
    #[arg(long, global = true, env = "CHATDRIVER_CONFIG_DIR", default_value = "config")]
    pub config_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one prompt and print the reply as JSON
    Ask {
        /// Prompt to send
        #[arg(long)]
        prompt: String,

        #[command(flatten)]
        session: SessionArgs,
    },
    /// Interactive chat on stdin
    Chat {
        #[command(flatten)]
        session: SessionArgs,
    },
    /// List registered site profiles and persons
    Profiles,
}

#[derive(Args, Debug, Default, Clone)]
pub struct SessionArgs {
    /// Site profile name
    #[arg(long = "config")]
    pub config_name: Option<String>,

    /// Person name
    #[arg(long = "person")]
    pub person_name: Option<String>,

    /// Enable logging (0/1)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub log: Option<u8>,
}

impl SessionArgs {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            config_name: self.config_name.clone(),
            person_name: self.person_name.clone(),
            logging_enabled: self.log.map(|flag| flag == 1),
        }
    }
}

impl Cli {
    pub fn overrides(&self) -> CliOverrides {
        match &self.command {
            Command::Ask { session, .. } | Command::Chat { session } => session.overrides(),
            Command::Profiles => CliOverrides::default(),
        }
    }
}
