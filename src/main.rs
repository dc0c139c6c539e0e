// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the Modbus handshake daemon
use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{error, info};
use std::path::PathBuf;
use tokio::signal;

use modbus_handshake::config::{self, Config, ModbusMode};
use modbus_handshake::daemon::Daemon;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Server,
    Client,
}

impl From<ModeArg> for ModbusMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Server => ModbusMode::Server,
            ModeArg::Client => ModbusMode::Client,
        }
    }
}

/// Vision-side trigger handshake over Modbus holding registers
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a configuration to validate and exit
    #[arg(long)]
    validate_config: Option<PathBuf>,

    /// Output the configuration schema as JSON and exit
    #[arg(long)]
    show_config_schema: bool,

    /// Host the register bank (server) or use a remote one (client)
    #[arg(long, value_enum)]
    modbus_mode: Option<ModeArg>,

    /// Modbus bind address (server) or remote host (client)
    #[arg(long)]
    modbus_address: Option<String>,

    /// Modbus TCP port
    #[arg(long)]
    modbus_port: Option<u16>,

    /// Handshake polling interval in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Reset timeout in milliseconds, 0 waits forever
    #[arg(long)]
    reset_timeout_ms: Option<u64>,

    /// Duration of a simulated capture in milliseconds
    #[arg(long)]
    capture_duration_ms: Option<u64>,

    /// Log every change of the monitored registers
    #[arg(long)]
    monitor: bool,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger with appropriate level based on verbose and quiet flags
    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if args.show_config_schema {
        return config::output_config_schema();
    }

    if let Some(validate_path) = args.validate_config {
        if !validate_path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file does not exist: {}",
                validate_path.display()
            ));
        }
        Config::from_file(&validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {}", err))?;
        println!("Configuration file is valid: {}", validate_path.display());
        return Ok(());
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.yaml"));
    let mut config = Config::from_file(&config_path)?;

    config.apply_args(
        args.modbus_mode.map(ModbusMode::from),
        args.modbus_address.clone(),
        args.modbus_port,
        args.poll_interval_ms,
        args.reset_timeout_ms,
        args.capture_duration_ms,
        args.monitor,
    );

    info!("Modbus handshake {}", env!("CARGO_PKG_VERSION"));
    let mut daemon = Daemon::new();
    daemon.launch(&config).await?;

    tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Unable to listen for shutdown signal: {}", e);
            }
            info!("Received shutdown signal");
        }
        _ = daemon.stop_signal().stopped() => {
            info!("Daemon stopped");
        }
    }

    daemon.shutdown();
    daemon.join().await
}
