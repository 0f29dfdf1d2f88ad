//! CLI command definitions for layerconf
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::error::ConfigError;
use crate::format::ConfigFormat;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Resolve layered configuration from files, environment and flags
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to read (skips the search)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory to search for the config file (repeatable)
    #[arg(long = "config-path", global = true)]
    pub config_paths: Vec<String>,

    /// Config file name without extension
    #[arg(long, default_value = "config", global = true)]
    pub config_name: String,

    /// Config file format, overriding the extension
    #[arg(long, global = true)]
    pub config_type: Option<String>,

    /// Prefix for environment variables (PREFIX_KEY_PATH)
    #[arg(long, global = true)]
    pub env_prefix: Option<String>,

    /// Override a key: key=value (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment, global = true)]
    pub overrides: Vec<(String, String)>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long = "log", default_value = "2", global = true)]
    pub log_target: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the resolved value of one key
    Get(GetArgs),

    /// Print all settings
    Dump(DumpArgs),

    /// List every key
    Keys,

    /// Write all settings to a file
    Write(WriteArgs),

    /// Print change events for the config file until interrupted
    Watch,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Dotted key, case-insensitive
    pub key: String,

    /// Type to read the value as
    #[arg(long = "as", value_enum, default_value_t = ValueKind::Value)]
    pub kind: ValueKind,

    /// Fail if no source has the key
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Output format
    #[arg(long, value_parser = parse_format, default_value = "yaml")]
    pub format: ConfigFormat,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Destination; the extension selects the format
    pub path: PathBuf,

    /// Replace an existing file
    #[arg(long)]
    pub force: bool,
}

/// Target type for `get --as`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ValueKind {
    /// Raw resolved value, printed as JSON
    #[default]
    Value,
    String,
    Int,
    Bool,
    Float,
    Duration,
    Slice,
    Map,
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))
}

fn parse_format(s: &str) -> Result<ConfigFormat, String> {
    s.parse().map_err(|e: ConfigError| e.to_string())
}
