// FILE: crates/cli/src/main.rs

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use mediasync_config::{Config, ConfigManager};
use std::path::PathBuf;

mod commands;

fn build_cli() -> Command {
    Command::new("mediasync")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Media timeline synchronisation engine tools")
        .arg(
            Arg::new("config-dir")
                .short('c')
                .long("config-dir")
                .value_name("DIR")
                .help("Directory holding config.toml (defaults to the platform config dir)")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log at debug level regardless of the configured level")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("config")
                .about("Manage the configuration file")
                .subcommand_required(true)
                .subcommand(Command::new("init").about("Write a default config file if none exists"))
                .subcommand(Command::new("show").about("Print the effective configuration"))
                .subcommand(Command::new("validate").about("Check the config file for invalid values"))
                .subcommand(Command::new("path").about("Print the config file location")),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run a master and a drifting slave through the engine")
                .arg(
                    Arg::new("drift")
                        .short('d')
                        .long("drift")
                        .value_name("RATE")
                        .help("Slave rate offset from the master, e.g. 0.02 runs 2% fast")
                        .value_parser(clap::value_parser!(f64))
                        .allow_negative_numbers(true)
                        .default_value("0.02"),
                )
                .arg(
                    Arg::new("tolerance")
                        .short('t')
                        .long("tolerance")
                        .value_name("MS")
                        .help("Requested tolerance in milliseconds")
                        .value_parser(clap::value_parser!(f64))
                        .default_value("40"),
                )
                .arg(
                    Arg::new("seconds")
                        .short('s')
                        .long("seconds")
                        .value_name("N")
                        .help("Simulated playback length")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("60"),
                )
                .arg(
                    Arg::new("step")
                        .long("step-ms")
                        .value_name("MS")
                        .help("Simulation step")
                        .value_parser(clap::value_parser!(u64).range(1..))
                        .default_value("500"),
                )
                .arg(
                    Arg::new("realtime")
                        .long("realtime")
                        .help("Pace the simulation with the wall clock")
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn config_manager(matches: &ArgMatches) -> Result<ConfigManager> {
    match matches.get_one::<String>("config-dir") {
        Some(dir) => Ok(ConfigManager::with_directory(PathBuf::from(dir))),
        None => ConfigManager::new().context("Failed to locate the config directory"),
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose {
        "debug".to_string()
    } else {
        config.logging.level.to_string()
    };
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
    if !config.logging.timestamps {
        builder.format_timestamp(None);
    }
    let _ = builder.try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let manager = config_manager(&matches)?;
    let config = manager.load_with_env_overrides().unwrap_or_else(|e| {
        eprintln!("Ignoring unreadable config: {}", e);
        Config::default()
    });
    init_logging(&config, matches.get_flag("verbose"));
    log::debug!("Using config file {}", manager.config_path().display());

    match matches.subcommand() {
        Some(("config", sub_matches)) => match sub_matches.subcommand() {
            Some(("init", _)) => commands::config_init(&manager),
            Some(("show", _)) => commands::config_show(&config),
            Some(("validate", _)) => commands::config_validate(&manager),
            Some(("path", _)) => {
                println!("{}", manager.config_path().display());
                Ok(())
            }
            _ => anyhow::bail!("Unknown config subcommand"),
        },
        Some(("simulate", sub_matches)) => {
            let params = commands::SimulationParams::from_matches(sub_matches)?;
            commands::simulate(&params, &config).await
        }
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}
