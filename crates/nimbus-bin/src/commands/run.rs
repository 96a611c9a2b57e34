// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use tracing::info;

use nimbus_config::ConfigLoader;

use crate::cli::{Cli, RunArgs};
use crate::error::{BinError, BinResult};
use crate::logging::init_logging;
use crate::runtime::RuntimeBuilder;

/// Executes the `run` command to start the gateway.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    // Load the configuration before initializing logging so the configured
    // level and format apply from the first runtime line.
    let config = ConfigLoader::new().load(&cli.config).map_err(|e| {
        BinError::Configuration(format!("Failed to load config from {:?}: {}", cli.config, e))
    })?;

    init_logging(
        &cli.effective_log_level(&config.logging.level),
        cli.effective_log_format(config.logging.format),
    );

    info!(config = %cli.config.display(), "Starting NIMBUS Gateway...");

    // Build the runtime
    let mut builder = RuntimeBuilder::new().config(config);
    if let Some(dir) = args.state_dir {
        builder = builder.state_dir(dir);
    }
    let runtime = builder.build()?;

    // Run the gateway
    runtime.run().await
}
