// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use nimbus_config::ConfigLoader;

use crate::cli::{Cli, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;

    // Check if file exists
    if !config_path.exists() {
        return Err(BinError::Configuration(format!(
            "Configuration file not found: {}",
            config_path.display()
        )));
    }

    // Load and validate configuration
    let config = ConfigLoader::new()
        .load(config_path)
        .map_err(|e| BinError::Configuration(format!("Configuration validation failed: {}", e)))?;

    println!("✓ Configuration is valid: {}", config_path.display());
    println!();
    println!("Summary:");
    println!("  Gateway ID:   {}", config.gateway.id);
    println!("  Gateway Name: {}", config.gateway.name);
    println!(
        "  Broker:       {}:{}",
        config.cloud.mqtt.host, config.cloud.mqtt.port
    );
    println!(
        "  Relay:        every {}s, aggregation {}",
        config.relay.interval.as_secs(),
        if config.relay.enable_aggregation {
            format!("enabled ({})", config.relay.policy)
        } else {
            "disabled".to_string()
        }
    );
    println!("  State Dir:    {}", config.paths.state_dir.display());

    if args.show_config {
        println!();
        println!("Parsed configuration:");
        println!(
            "{}",
            serde_json::to_string_pretty(&config)
                .unwrap_or_else(|_| "(serialization error)".to_string())
        );
    }

    Ok(())
}
