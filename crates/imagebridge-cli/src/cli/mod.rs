//! CLI for the imagebridge image generation tool.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use imagebridge_core::config;

use commands::{run_call, run_config_path, run_generate, run_schema, GenerateOpts};

/// Top-level CLI for imagebridge.
#[derive(Debug, Parser)]
#[command(name = "imagebridge")]
#[command(about = "imagebridge: generate images through the Ideogram API with retry", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Generate images from a prompt and print the tool result as JSON.
    Generate(GenerateOpts),

    /// Run a raw tool call, e.g. '{"name":"generate_image","arguments":{"prompt":"a cat"}}'.
    Call {
        /// Tool call as JSON.
        json: String,
    },

    /// Print the tool descriptor (name, description, input schema).
    Schema,

    /// Print the config file location.
    ConfigPath,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Schema => run_schema()?,
            CliCommand::ConfigPath => run_config_path()?,
            CliCommand::Generate(opts) => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_generate(&cfg, opts).await?;
            }
            CliCommand::Call { json } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_call(&cfg, &json).await?;
            }
        }

        Ok(())
    }
}
