// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! This module provides the command-line interface for NIMBUS using clap:
//!
//! - `run`: Start the gateway (default)
//! - `validate`: Validate configuration file
//! - `version`: Show version information

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use nimbus_config::LogFormat;

// =============================================================================
// Main CLI Structure
// =============================================================================

/// NIMBUS - Northbound Industrial Message Bridge for Upstream Systems
///
/// Device-to-cloud telemetry relay for industrial gateways, speaking the
/// platform's template protocol over MQTT.
#[derive(Parser, Debug)]
#[command(
    name = "nimbus",
    author = "Sylvex <contact@sylvex.io>",
    version = nimbus_core::VERSION,
    about = "Northbound Industrial Message Bridge for Upstream Systems",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "nimbus.yaml",
        env = "NIMBUS_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, env = "NIMBUS_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log format (text, json, compact); overrides the config file
    #[arg(long, env = "NIMBUS_LOG_FORMAT", value_parser = parse_log_format, global = true)]
    pub log_format: Option<LogFormat>,

    /// Enable quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands for the NIMBUS CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the gateway
    ///
    /// This is the default command when no subcommand is specified. It
    /// provisions against the platform if needed, connects, announces the
    /// device inventory and starts the relay and command dispatcher.
    Run(RunArgs),

    /// Validate the configuration file
    ///
    /// Parses and validates the configuration file without starting the
    /// gateway. Useful for checking configuration before deployment.
    Validate(ValidateArgs),

    /// Show detailed version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `run` command.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Override the state directory from the configuration file
    ///
    /// Markers, settings and staged firmware move with it. Useful for
    /// running a second instance against the same configuration.
    #[arg(long)]
    pub state_dir: Option<PathBuf>,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Default, Clone)]
pub struct ValidateArgs {
    /// Show the parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Run` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// Effective log level: quiet/verbose flags win, then an explicit
    /// `--log-level`, then the configuration file's value.
    pub fn effective_log_level(&self, config_level: &str) -> String {
        if self.quiet {
            "warn".to_string()
        } else if self.verbose {
            "debug".to_string()
        } else {
            self.log_level
                .clone()
                .unwrap_or_else(|| config_level.to_string())
        }
    }

    /// Effective log format: an explicit `--log-format` wins over the
    /// configuration file's value.
    pub fn effective_log_format(&self, config_format: LogFormat) -> LogFormat {
        self.log_format.unwrap_or(config_format)
    }
}

/// Parses a `--log-format` value.
fn parse_log_format(raw: &str) -> Result<LogFormat, String> {
    match raw.to_lowercase().as_str() {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        "compact" => Ok(LogFormat::Compact),
        other => Err(format!(
            "unknown log format '{}' (expected text, json or compact)",
            other
        )),
    }
}

// =============================================================================
// Tests
// =============================================================================
