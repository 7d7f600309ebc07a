//! Config command handlers

use crate::cli::ConfigInitArgs;
use anyhow::bail;
use colored::Colorize;
use std::fs;

const EXAMPLE_CONFIG: &str = include_str!("../../correlog.example.toml");

/// Handle `correlog config init` command
pub fn handle_config_init(args: &ConfigInitArgs) -> anyhow::Result<()> {
    if args.output.exists() && !args.force {
        bail!(
            "File already exists: {}. Use --force to overwrite.",
            args.output.display()
        );
    }

    fs::write(&args.output, EXAMPLE_CONFIG)?;

    println!(
        "{} Configuration file created: {}",
        "✓".green(),
        args.output.display()
    );
    println!("  Pick an exporter under [exporter] and run `correlog serve`.");

    Ok(())
}
