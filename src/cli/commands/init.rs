//! Init and Config commands.

use std::path::Path;

use anyhow::{Context, bail};

use crate::config::Settings;

/// Run init command - write a default configuration file.
pub fn run_init(config_path: &Path, force: bool) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        bail!(
            "Configuration file already exists at: {}\nUse --force to overwrite",
            config_path.display()
        );
    }

    let mut settings = Settings::default();
    settings.feeds.push("./feeds".into());

    // JSON paths keep the plain `{"feeds": [...]}` layout
    if is_toml(config_path) {
        settings
            .save(config_path)
            .with_context(|| format!("writing {}", config_path.display()))?;
    } else {
        let json = serde_json::to_string_pretty(&settings)?;
        std::fs::write(config_path, json + "\n")
            .with_context(|| format!("writing {}", config_path.display()))?;
    }

    println!("Created configuration file at: {}", config_path.display());
    println!("Edit this file to list your feed directories and collector endpoint.");
    Ok(())
}

/// Run config command - display current configuration.
pub fn run_config(config: &Settings) -> anyhow::Result<()> {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}
