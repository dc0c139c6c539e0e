// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Tests for the HandshakeModbusServer implementation
//!
//! These tests start a server instance on an OS-assigned port and talk to it
//! with a tokio-modbus client and with [`ModbusTcpStore`].

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time;
use tokio_modbus::prelude::*;

use modbus_handshake::modbus::serve_registers;
use modbus_handshake::register::{
    MemoryRegisterStore, ModbusTcpStore, RegisterStore, TransportError,
};

/// Test utility function to start a Modbus server in the background
async fn start_test_server(
    store: MemoryRegisterStore,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), Box<dyn std::error::Error>> {
    // Use port 0 to let the OS assign an available port
    let socket_addr = SocketAddr::from_str("127.0.0.1:0")?;
    let listener = TcpListener::bind(socket_addr).await?;
    let socket_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = serve_registers(listener, store).await {
            eprintln!("Server error: {}", e);
        }
    });

    // Give the server a moment to start
    time::sleep(Duration::from_millis(100)).await;

    Ok((socket_addr, handle))
}

#[tokio::test]
async fn test_read_and_write_holding_registers() -> Result<(), Box<dyn std::error::Error>> {
    let store = MemoryRegisterStore::with_values([(1025, 1)]);
    let (socket_addr, server_handle) = start_test_server(store.clone()).await?;

    let mut ctx = tcp::connect(socket_addr).await?;

    let data = ctx.read_holding_registers(1024, 2).await??;
    assert_eq!(data, vec![0, 1]);

    ctx.write_single_register(1024, 1).await??;
    assert_eq!(store.get(1024)?, 1);

    ctx.write_multiple_registers(41025, &[1, 1]).await??;
    let data = ctx.read_holding_registers(41025, 2).await??;
    assert_eq!(data, vec![1, 1]);

    ctx.disconnect().await?;
    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_unsupported_function_returns_exception() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, server_handle) = start_test_server(MemoryRegisterStore::new()).await?;
    let mut ctx = tcp::connect(socket_addr).await?;

    let response = ctx.read_input_registers(0, 1).await?;
    assert_eq!(response, Err(ExceptionCode::IllegalFunction));

    let response = ctx.read_holding_registers(65535, 2).await?;
    assert_eq!(response, Err(ExceptionCode::IllegalDataAddress));

    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_tcp_store_reaches_served_bank() -> Result<(), Box<dyn std::error::Error>> {
    let bank = MemoryRegisterStore::new();
    let (socket_addr, server_handle) = start_test_server(bank.clone()).await?;

    let store = ModbusTcpStore::connect(socket_addr, 1, Duration::from_secs(1)).await?;
    assert_eq!(store.peer(), socket_addr);

    store.write_register(1025, 1).await?;
    assert_eq!(bank.get(1025)?, 1);

    bank.set(1024, 1)?;
    assert_eq!(store.read_register(1024).await?, 1);

    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_tcp_store_reports_connection_failure() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let socket_addr = listener.local_addr().unwrap();
    drop(listener);

    let result = ModbusTcpStore::connect(socket_addr, 1, Duration::from_secs(1)).await;
    assert!(matches!(
        result,
        Err(TransportError::Io { .. }) | Err(TransportError::Timeout { .. })
    ));
}
