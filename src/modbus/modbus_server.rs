// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus server implementation for the handshake register bank
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" instead. The server is the device that provides data,
//! while the client is the device that requests data.
//! Here the robot controller is the client (Modbus master) and this peer is the server.

use std::{future, net::SocketAddr};

use log::{debug, error, info};
use tokio::net::TcpListener;
use tokio_modbus::{
    prelude::*,
    server::tcp::{accept_tcp_connection, Server},
};

use crate::register::MemoryRegisterStore;

/// Modbus request handler backed by a shared register bank
#[derive(Clone)]
pub struct HandshakeModbusServer {
    store: MemoryRegisterStore,
}

impl tokio_modbus::server::Service for HandshakeModbusServer {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        let res = match req {
            Request::ReadHoldingRegisters(addr, cnt) => {
                self.register_read(addr, cnt).map(Response::ReadHoldingRegisters)
            }
            Request::WriteMultipleRegisters(addr, values) => self
                .register_write(addr, &values)
                .map(|_| Response::WriteMultipleRegisters(addr, values.len() as u16)),
            Request::WriteSingleRegister(addr, value) => self
                .register_write(addr, std::slice::from_ref(&value))
                .map(|_| Response::WriteSingleRegister(addr, value)),
            _ => {
                error!("SERVER: Exception::IllegalFunction - Unimplemented function code in request: {req:?}");
                Err(ExceptionCode::IllegalFunction)
            }
        };
        future::ready(res)
    }
}

impl HandshakeModbusServer {
    /// Create a handler serving `store`
    pub fn new(store: MemoryRegisterStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MemoryRegisterStore {
        &self.store
    }

    fn register_read(&self, addr: u16, cnt: u16) -> Result<Vec<u16>, ExceptionCode> {
        if cnt == 0 {
            error!("SERVER: Exception::IllegalDataValue - zero register count");
            return Err(ExceptionCode::IllegalDataValue);
        }
        match self.store.get_range(addr, cnt) {
            Ok(Some(values)) => Ok(values),
            Ok(None) => {
                error!("SERVER: Exception::IllegalDataAddress - read {cnt} registers at {addr}");
                Err(ExceptionCode::IllegalDataAddress)
            }
            Err(e) => {
                error!("SERVER: Exception::ServerDeviceFailure - {e}");
                Err(ExceptionCode::ServerDeviceFailure)
            }
        }
    }

    /// Write holding registers. Used by both the write single register
    /// and write multiple registers requests.
    fn register_write(&self, addr: u16, values: &[u16]) -> Result<(), ExceptionCode> {
        if values.is_empty() {
            error!("SERVER: Exception::IllegalDataValue - empty write");
            return Err(ExceptionCode::IllegalDataValue);
        }
        match self.store.set_range(addr, values) {
            Ok(true) => {
                debug!("SERVER: wrote {values:?} at {addr}");
                Ok(())
            }
            Ok(false) => {
                error!(
                    "SERVER: Exception::IllegalDataAddress - write {} registers at {addr}",
                    values.len()
                );
                Err(ExceptionCode::IllegalDataAddress)
            }
            Err(e) => {
                error!("SERVER: Exception::ServerDeviceFailure - {e}");
                Err(ExceptionCode::ServerDeviceFailure)
            }
        }
    }
}

/// Serve `store` over Modbus TCP on an already bound listener
///
/// Every connection gets a handler on the same bank. The future only
/// completes on a listener error; drop or abort it to stop serving.
pub async fn serve_registers(
    listener: TcpListener,
    store: MemoryRegisterStore,
) -> anyhow::Result<()> {
    if let Ok(local) = listener.local_addr() {
        info!("Modbus server listening on {}", local);
    }
    let server = Server::new(listener);

    let on_connected = move |stream, socket_addr: SocketAddr| {
        let store = store.clone();
        async move {
            info!("Modbus client connected from {}", socket_addr);
            accept_tcp_connection(stream, socket_addr, move |_socket_addr| {
                Ok(Some(HandshakeModbusServer::new(store.clone())))
            })
        }
    };

    let on_process_error = |err| {
        error!("Modbus server error: {err}");
    };

    server.serve(&on_connected, on_process_error).await?;
    Ok(())
}
