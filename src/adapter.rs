//! Component interfaces shared by the registry, the build profiles, and the
//! runtime.
//!
//! Every configurable component kind gets a trait object type here. The
//! registry constructs components behind these traits; the runtime drives
//! their staged lifecycle and exposes the [`Router`] handle that components
//! use to reach each other.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::address::NetLocation;
use crate::dialer::Dialer;

/// Byte stream returned by outbound and endpoint dials.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Network {
    Tcp,
    Udp,
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Network::Tcp => write!(f, "tcp"),
            Network::Udp => write!(f, "udp"),
        }
    }
}

/// Startup phases, in invocation order. Components receive every stage and
/// act only on the ones they care about; listeners and interfaces come up at
/// `Start`, after routing state from `Initialize` is in place.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StartStage {
    Initialize,
    Start,
    PostStart,
    Started,
}

impl StartStage {
    pub const ALL: [StartStage; 4] = [
        StartStage::Initialize,
        StartStage::Start,
        StartStage::PostStart,
        StartStage::Started,
    ];
}

#[async_trait]
pub trait Lifecycle: Send + Sync {
    fn tag(&self) -> &str;

    async fn start(&self, _stage: StartStage) -> std::io::Result<()> {
        Ok(())
    }

    async fn close(&self) -> std::io::Result<()> {
        Ok(())
    }
}

pub trait Inbound: Lifecycle {}

#[async_trait]
pub trait Outbound: Lifecycle {
    async fn dial(&self, destination: &NetLocation) -> std::io::Result<Box<dyn AsyncStream>>;
}

/// A tunnel-style component owning its own network interface. Unlike plain
/// outbounds, endpoints can also receive packet listeners over the tunnel.
#[async_trait]
pub trait Endpoint: Lifecycle {
    async fn dial(
        &self,
        network: Network,
        destination: &NetLocation,
    ) -> std::io::Result<Box<dyn AsyncStream>>;

    async fn listen_packet(
        &self,
        destination: &NetLocation,
    ) -> std::io::Result<tokio::net::UdpSocket>;
}

#[async_trait]
pub trait DnsTransport: Lifecycle {
    async fn lookup(&self, host: &str) -> std::io::Result<Vec<IpAddr>>;
}

pub trait Service: Lifecycle {}

/// Runtime handle passed to constructors. Components resolve sibling
/// outbounds by tag and route traffic through whatever the runtime considers
/// the default path.
#[async_trait]
pub trait Router: Send + Sync {
    fn outbound(&self, tag: &str) -> Option<Arc<dyn Outbound>>;

    /// Dial through the default outbound.
    async fn route(&self, destination: &NetLocation) -> std::io::Result<Box<dyn AsyncStream>>;
}

/// Everything a constructor gets besides its own options: the runtime handle
/// and the process-wide dialer.
#[derive(Clone)]
pub struct ConstructContext {
    pub router: Arc<dyn Router>,
    pub dialer: Arc<dyn Dialer>,
}

impl ConstructContext {
    pub fn new(router: Arc<dyn Router>, dialer: Arc<dyn Dialer>) -> Self {
        Self { router, dialer }
    }
}
