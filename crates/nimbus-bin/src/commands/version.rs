// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Executes the `version` command to display version information.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("NIMBUS - Northbound Industrial Message Bridge for Upstream Systems");
    println!();
    println!("Version Information:");
    println!("  nimbus-bin:       {}", env!("CARGO_PKG_VERSION"));
    println!("  nimbus-core:      {}", nimbus_core::VERSION);
    println!("  nimbus-codec:     {}", nimbus_codec::VERSION);
    println!("  nimbus-aggregate: {}", nimbus_aggregate::VERSION);
    println!("  nimbus-relay:     {}", nimbus_relay::VERSION);
    println!("  nimbus-link:      {}", nimbus_link::VERSION);
    println!("  nimbus-config:    {}", nimbus_config::VERSION);
    println!();
    println!("Build Information:");
    println!("  Rust Edition: 2021");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");
    println!();
    println!("For commercial licensing, contact: contact@sylvex.io");

    Ok(())
}
