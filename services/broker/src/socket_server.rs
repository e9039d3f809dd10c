//! Binds the client-facing socket and hands the accept loop to the core's
//! session manager (C7). Kept as a thin wrapper so `main.rs` only deals with
//! `std::io::Result` and a bound address to log.

use std::net::SocketAddr;
use std::sync::Arc;

use broker_core::Broker;
use tokio::net::TcpListener;

pub async fn bind_and_serve(broker: Arc<Broker>, port: u16) -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    let addr = listener.local_addr()?;
    tokio::spawn(broker_core::run_session_manager(broker, listener));
    Ok(addr)
}
