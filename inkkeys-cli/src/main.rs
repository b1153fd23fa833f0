//! inkkeys CLI - Host controller for the inkkeys macro keypad.
//!
//! ## Features
//!
//! - Keep the keypad connected and switch macro modes with the focused application
//! - Query the keypad's capabilities
//! - List serial ports and spot the keypad among them
//! - Shell completion generation
//! - Environment variable and config file support

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use inkkeys::SerialConnector;
use log::debug;

mod commands;
mod config;
mod inspect;
mod modes;
#[cfg(test)]
mod testing;

use commands::completions::{cmd_completions, cmd_completions_install};
use commands::info::cmd_info;
use commands::ports::cmd_list_ports;
use commands::run::cmd_run;
use config::Config;

/// inkkeys - Drive the inkkeys macro keypad from the desktop.
///
/// Environment variables:
///   INKKEYS_PORT    - Serial port to use instead of USB discovery
///   INKKEYS_DEBUG   - Enable debug logging
///   RUST_LOG        - Override the log filter
#[derive(Parser)]
#[command(name = "inkkeys")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = "Without a command, inkkeys runs until interrupted (same as `inkkeys run`).")]
struct Cli {
    /// Serial port to use (discovered by USB VID/PID if not specified).
    #[arg(short, long, global = true, env = "INKKEYS_PORT")]
    port: Option<String>,

    /// USB vendor ID used for discovery (hex).
    #[arg(long, global = true, value_parser = parse_hex_u16)]
    vid: Option<u16>,

    /// USB product ID used for discovery (hex).
    #[arg(long, global = true, value_parser = parse_hex_u16)]
    pid: Option<u16>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (warnings and errors only).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable debug logging (same as -v).
    #[arg(long, global = true, env = "INKKEYS_DEBUG")]
    debug: bool,

    /// Path to a configuration file, replacing the global and local ones.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Connect to the keypad and run the configured modes (default).
    Run,

    /// Connect once and show the keypad's capabilities.
    Info {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List available serial ports.
    ListPorts {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type (auto-detected with --install).
        #[arg(value_enum)]
        shell: Option<Shell>,

        /// Install the completion script for the current user.
        #[arg(long)]
        install: bool,
    },
}

/// Parse a hex value with or without `0x` prefix.
fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid hex ID '{s}': {e}"))
}

/// Effective verbosity: `--debug` or `debug = true` count as `-v`.
fn verbosity(cli: &Cli, config: &Config) -> u8 {
    if cli.verbose == 0 && (cli.debug || config.debug) {
        1
    } else {
        cli.verbose
    }
}

fn init_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(verbose >= 2)
        .format_timestamp(if verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();
}

fn main() -> Result<()> {
    if std::env::var_os("NO_COLOR").is_some() || !console::Term::stderr().is_term() {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)?
    } else {
        Config::load()?
    };

    let verbose = verbosity(&cli, &config);
    init_logging(cli.quiet, verbose);

    debug!(
        "inkkeys v{} (verbose level: {verbose})",
        env!("CARGO_PKG_VERSION")
    );
    for source in &config.sources {
        debug!("Loaded config from {}", source.display());
    }

    match &cli.command {
        None | Some(Commands::Run) => {
            cmd_run(&config, commands::resolve_target(&cli, &config))?;
        },
        Some(Commands::Info { json }) => {
            let mut connector = SerialConnector::new(commands::resolve_target(&cli, &config))
                .with_config(commands::serial_config(&config));
            cmd_info(&mut connector, *json)?;
        },
        Some(Commands::ListPorts { json }) => {
            let (vid, pid) = commands::usb_ids(&cli, &config);
            cmd_list_ports(*json, vid, pid)?;
        },
        Some(Commands::Completions { shell, install }) => {
            if *install {
                cmd_completions_install(*shell)?;
            } else if let Some(shell) = shell {
                cmd_completions(*shell);
            } else {
                eprintln!(
                    "{} specify a shell type, e.g.: inkkeys completions bash",
                    style("Error:").red().bold()
                );
                eprintln!(
                    "  Or use {} to auto-install completions.",
                    style("inkkeys completions --install").cyan()
                );
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
