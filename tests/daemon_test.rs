// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Daemon tests over real Modbus TCP connections on loopback

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::{sleep, timeout, Instant};

use modbus_handshake::config::{Config, ModbusMode};
use modbus_handshake::daemon::Daemon;
use modbus_handshake::modbus::serve_registers;
use modbus_handshake::register::{MemoryRegisterStore, ModbusTcpStore, RegisterStore};

fn fast_config() -> Config {
    let mut config = Config::default();
    config.modbus.address = "127.0.0.1".to_string();
    // Let the OS pick the port
    config.modbus.port = 0;
    config.handshake.poll_interval_ms = 10;
    config.handshake.reset_timeout_ms = Some(2000);
    config.handshake.status_interval_ms = 100;
    config.capture.steps = 1;
    config.capture.duration_ms = 50;
    config
}

async fn wait_for_value(store: &dyn RegisterStore, address: u16, expected: u16) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if store.read_register(address).await.unwrap() == expected {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "register {} never became {}",
            address,
            expected
        );
        sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_server_mode_full_cycle_over_tcp() {
    let mut daemon = Daemon::new();
    daemon.launch(&fast_config()).await.unwrap();
    let addr = daemon.modbus_local_addr().expect("server not started");
    let session = daemon.session().expect("handshake not started");

    // Give the coordinator time to initialize
    sleep(Duration::from_millis(100)).await;

    let robot = ModbusTcpStore::connect(addr, 1, Duration::from_secs(1))
        .await
        .unwrap();
    robot.write_register(1024, 1).await.unwrap();
    wait_for_value(&robot, 1025, 1).await;
    assert_eq!(robot.read_register(41026).await.unwrap(), 1);

    robot.write_register(1024, 0).await.unwrap();
    wait_for_value(&robot, 1025, 0).await;
    assert_eq!(robot.read_register(41026).await.unwrap(), 0);

    sleep(Duration::from_millis(50)).await;
    assert_eq!(session.borrow().shot_count, 1);
    assert_eq!(session.borrow().completed_cycles, 1);

    daemon.shutdown();
    timeout(Duration::from_secs(10), daemon.join())
        .await
        .expect("daemon did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_client_mode_drives_remote_bank() {
    let bank = MemoryRegisterStore::new();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(serve_registers(listener, bank.clone()));

    let mut config = fast_config();
    config.modbus.mode = ModbusMode::Client;
    config.modbus.port = port;
    config.monitor.enabled = true;
    config.monitor.interval_ms = 20;

    let mut daemon = Daemon::new();
    daemon.launch(&config).await.unwrap();
    assert!(daemon.modbus_local_addr().is_none());
    assert!(daemon.memory_store().is_none());

    sleep(Duration::from_millis(100)).await;
    bank.set(1024, 1).unwrap();
    wait_for_value(&bank, 1025, 1).await;
    bank.set(1024, 0).unwrap();
    wait_for_value(&bank, 1025, 0).await;

    daemon.shutdown();
    timeout(Duration::from_secs(10), daemon.join())
        .await
        .expect("daemon did not stop")
        .unwrap();
    server.abort();
}

#[tokio::test]
async fn test_client_mode_without_server_fails_to_launch() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut config = fast_config();
    config.modbus.mode = ModbusMode::Client;
    config.modbus.port = port;

    let mut daemon = Daemon::new();
    assert!(daemon.launch(&config).await.is_err());
}
