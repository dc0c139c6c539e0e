// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Robot controller simulator driving the handshake from the PLC side
use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use std::net::SocketAddr;
use tokio::time::{Duration, Instant};

use modbus_handshake::handshake::{PollOutcome, PollingLoop, StopSignal};
use modbus_handshake::register::{ModbusTcpStore, RegisterStore, TransportError};

/// Raises Trigger, waits for Done, lowers Trigger and waits for Done to drop
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Modbus server address
    #[clap(long, default_value = "127.0.0.1")]
    address: String,

    /// Modbus server port
    #[clap(long, default_value = "502")]
    port: u16,

    /// Unit identifier
    #[clap(long, default_value = "1")]
    unit_id: u8,

    /// Number of handshake cycles to run
    #[clap(long, default_value = "1")]
    cycles: u32,

    /// Trigger register address
    #[clap(long, default_value = "1024")]
    trigger: u16,

    /// Done register address
    #[clap(long, default_value = "1025")]
    done: u16,

    /// Longest wait for each Done transition, in milliseconds
    #[clap(long, default_value = "10000")]
    timeout_ms: u64,

    /// Polling interval in milliseconds
    #[clap(long, default_value = "50")]
    poll_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();

    let socket_addr: SocketAddr = format!("{}:{}", args.address, args.port)
        .parse()
        .with_context(|| format!("Invalid server address {}:{}", args.address, args.port))?;
    let store = ModbusTcpStore::connect(socket_addr, args.unit_id, Duration::from_secs(1))
        .await
        .with_context(|| format!("Failed to connect to {}", socket_addr))?;

    let polling = PollingLoop::new(Duration::from_millis(args.poll_ms), StopSignal::new());
    let timeout = Duration::from_millis(args.timeout_ms);

    let mut latencies = Vec::new();
    for cycle in 1..=args.cycles {
        info!(
            "Cycle {}/{}: raising Trigger at {}",
            cycle, args.cycles, args.trigger
        );
        let started = Instant::now();
        store.write_register(args.trigger, 1).await?;

        if wait_for(&store, &polling, args.done, 1, timeout).await? != PollOutcome::Satisfied {
            // Leave the bank clean for the next run
            store.write_register(args.trigger, 0).await?;
            bail!("Done not raised within {} ms", args.timeout_ms);
        }
        let latency = started.elapsed();
        info!("Done raised after {} ms, lowering Trigger", latency.as_millis());

        store.write_register(args.trigger, 0).await?;
        if wait_for(&store, &polling, args.done, 0, timeout).await? != PollOutcome::Satisfied {
            bail!("Done not cleared within {} ms", args.timeout_ms);
        }
        info!(
            "Cycle {} complete in {} ms",
            cycle,
            started.elapsed().as_millis()
        );
        latencies.push(latency);
    }

    if let (Some(min), Some(max)) = (latencies.iter().min(), latencies.iter().max()) {
        let total: Duration = latencies.iter().sum();
        info!(
            "{} cycle(s): trigger to done latency min {} ms, max {} ms, mean {} ms",
            latencies.len(),
            min.as_millis(),
            max.as_millis(),
            (total / latencies.len() as u32).as_millis()
        );
    } else {
        warn!("No cycle was run");
    }
    Ok(())
}

async fn wait_for(
    store: &ModbusTcpStore,
    polling: &PollingLoop,
    address: u16,
    expected: u16,
    timeout: Duration,
) -> Result<PollOutcome> {
    let outcome = polling
        .run(Some(timeout), || async move {
            Ok::<bool, TransportError>(store.read_register(address).await? == expected)
        })
        .await?;
    Ok(outcome)
}
