//! layerconf
//!
//! Resolves configuration from a config file, the environment and its own
//! flags, then prints, exports or watches the result.

use anyhow::Result;
use clap::{CommandFactory, FromArgMatches};
use layerconf::cli::{Cli, Command, GetArgs, ValueKind};
use layerconf::logging::{self, LogTarget};
use layerconf::{Config, ConfigChangeEvent, ConfigError, FromValue, merge};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    let target: LogTarget = cli.log_target.parse()?;
    logging::init(&target, cli.verbose)?;

    let config = build_config(&cli, matches)?;

    match &cli.command {
        Command::Get(args) => print_value(&config, args)?,
        Command::Dump(args) => {
            let rendered = args
                .format
                .serialize(&config.all_settings())
                .map_err(anyhow::Error::msg)?;
            print!("{rendered}");
        }
        Command::Keys => {
            for key in config.all_keys() {
                println!("{key}");
            }
        }
        Command::Write(args) => {
            if args.force {
                config.write_config_as(&args.path)?;
            } else {
                config.safe_write_config_as(&args.path)?;
            }
            println!("Wrote {}", args.path.display());
        }
        Command::Watch => watch(&config).await?,
    }

    Ok(())
}

/// Assemble the handle from the command line: file search settings,
/// environment, `--set` overrides and the `--verbose` flag.
fn build_config(cli: &Cli, matches: clap::ArgMatches) -> Result<Config> {
    let config = Config::new();

    if let Some(file) = &cli.config {
        config.set_config_file(file.clone());
    }
    if cli.config_paths.is_empty() {
        config.add_config_path(".");
    }
    for path in &cli.config_paths {
        config.add_config_path(path);
    }
    config.set_config_name(&cli.config_name);
    if let Some(config_type) = &cli.config_type {
        config.set_config_type(config_type);
    }

    if let Some(prefix) = &cli.env_prefix {
        config.set_env_prefix(prefix);
    }
    config.automatic_env();

    config.set_default("log.verbose", false)?;
    config.bind_flag("log.verbose", "verbose", Arc::new(matches))?;

    for (key, value) in &cli.overrides {
        config.set(key, value.as_str())?;
    }

    match config.read_in_config() {
        Ok(()) => {
            if let Some(path) = config.config_file_used() {
                info!("Using config file: {}", path.display());
            }
        }
        Err(ConfigError::ConfigFileNotFound { name, locations }) if cli.config.is_none() => {
            debug!(%name, ?locations, "no config file found, continuing without one");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(config)
}

fn read<T: FromValue>(config: &Config, args: &GetArgs) -> layerconf::ConfigResult<T> {
    if args.strict {
        config.get_as_strict(&args.key)
    } else {
        config.get_as(&args.key)
    }
}

fn print_value(config: &Config, args: &GetArgs) -> Result<()> {
    match args.kind {
        ValueKind::Value => {
            let value: Value = read(config, args)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        ValueKind::String => println!("{}", read::<String>(config, args)?),
        ValueKind::Int => println!("{}", read::<i64>(config, args)?),
        ValueKind::Bool => println!("{}", read::<bool>(config, args)?),
        ValueKind::Float => println!("{}", read::<f64>(config, args)?),
        ValueKind::Duration => println!("{:?}", read::<std::time::Duration>(config, args)?),
        ValueKind::Slice => {
            for item in read::<Vec<String>>(config, args)? {
                println!("{item}");
            }
        }
        ValueKind::Map => {
            let map: merge::Map = read(config, args)?;
            println!("{}", serde_json::to_string_pretty(&map)?);
        }
    }
    Ok(())
}

async fn watch(config: &Config) -> Result<()> {
    config.watch_config()?;
    let mut changes = config.subscribe();
    if let Some(path) = config.config_file_used() {
        info!("Watching {} (Ctrl-C to stop)", path.display());
    }

    loop {
        tokio::select! {
            change = changes.wait_for_change() => match change {
                Some(ConfigChangeEvent::Reloaded { path, generation, settings, at }) => {
                    println!(
                        "{at} reloaded {} (generation {generation}, {} keys)",
                        path.display(),
                        merge::leaf_keys(&settings).len()
                    );
                }
                Some(ConfigChangeEvent::ReloadFailed { path, error, at }) => {
                    eprintln!("{at} reload of {} failed: {error}", path.display());
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    config.unwatch();
    Ok(())
}
