//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser, Debug)]
#[command(name = "feedwatch", version)]
#[command(about = "Watch feed directories and relay new files to a collector")]
#[command(styles = clap_cargo_style())]
pub struct Cli {
    /// Configuration file (TOML when it ends in .toml, JSON otherwise)
    #[arg(short, long, global = true, default_value = "./config.json", env = "FEEDWATCH_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Watch the feeds and relay files until interrupted (default)
    Run,

    /// Run a single scan and print the events it would emit
    Scan,

    /// Parse one file and print the resulting document as JSON
    Parse {
        /// File to parse
        file: PathBuf,
    },

    /// Display active settings
    Config,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
