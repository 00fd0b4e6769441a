//! Shared helpers for unit tests.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::adapter::{AsyncStream, ConstructContext, Outbound, Router};
use crate::address::NetLocation;
use crate::dialer::DirectDialer;

/// Router with no outbounds; every route fails.
pub struct NullRouter;

#[async_trait]
impl Router for NullRouter {
    fn outbound(&self, _tag: &str) -> Option<Arc<dyn Outbound>> {
        None
    }

    async fn route(&self, _destination: &NetLocation) -> std::io::Result<Box<dyn AsyncStream>> {
        Err(std::io::Error::other("no outbounds"))
    }
}

/// Router that sends every destination to one fixed local address.
pub struct EchoRouter {
    pub echo_addr: SocketAddr,
}

#[async_trait]
impl Router for EchoRouter {
    fn outbound(&self, _tag: &str) -> Option<Arc<dyn Outbound>> {
        None
    }

    async fn route(&self, _destination: &NetLocation) -> std::io::Result<Box<dyn AsyncStream>> {
        Ok(Box::new(TcpStream::connect(self.echo_addr).await?))
    }
}

pub fn null_ctx() -> ConstructContext {
    ConstructContext::new(Arc::new(NullRouter), Arc::new(DirectDialer::default()))
}

/// Spawn a TCP echo server on loopback and return its address.
pub async fn spawn_echo_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let (mut r, mut w) = stream.split();
                let _ = tokio::io::copy(&mut r, &mut w).await;
            });
        }
    });
    addr
}
