// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! NIMBUS - Northbound Industrial Message Bridge for Upstream Systems
//!
//! Main binary entry point for the NIMBUS gateway.

use nimbus_bin::cli::Cli;
use nimbus_bin::commands;
use nimbus_bin::error::report_error_and_exit;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    if let Err(error) = commands::execute(cli).await {
        report_error_and_exit(error);
    }
}
