use async_trait::async_trait;
use std::net::SocketAddr;

use crate::HardwareError;

/// Out-of-core collaborator for the clientize DISCOVER state (§4.8, §6
/// "SSDP discovery"). Real SSDP is not part of this workspace; the service
/// binary supplies a multicast implementation and tests supply a fake that
/// returns a fixed address.
#[async_trait]
pub trait DiscoveryProvider: Send + Sync {
    async fn discover(&self) -> Result<SocketAddr, HardwareError>;
}
