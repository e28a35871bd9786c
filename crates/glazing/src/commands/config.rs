//! Config command - inspect the effective configuration.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration as TOML, secrets redacted (default)
    Show,

    /// Show which config files are loaded and their precedence
    Which,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = super::load_config(ctx)?;

    for warning in &loaded.warnings {
        eprintln!("warning: {}", warning);
    }

    // Fill every section so defaults are visible
    let mut effective = glazing_config::GlazingConfig::new();
    effective.server = Some(loaded.config.server());
    effective.llm = Some(loaded.config.llm());
    effective.session = Some(loaded.config.session());

    println!("{}", effective.redacted().to_toml()?);
    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    let loaded = super::load_config(ctx)?;

    println!("Config file search order (later overrides earlier):\n");

    for source in &loaded.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!("  {} {}", status, source.path.display());
    }

    println!();
    let loaded_count = loaded.loaded_from().len();
    if loaded_count == 0 {
        println!("No config files found, using defaults.");
    } else {
        println!("{} config file(s) loaded.", loaded_count);
    }

    Ok(())
}
