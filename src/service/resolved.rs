//! Stub-resolver socket service.
//!
//! Reserves the local stub resolver address for the lifetime of the process
//! so DNS clients pointed at it fail fast instead of leaking queries to
//! whatever resolver ran there before.

use async_trait::async_trait;
use log::info;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::net::UdpSocket;

use crate::adapter::{ConstructContext, Lifecycle, Service, StartStage};
use crate::address::NetLocation;
use crate::constant;
use crate::registry::RegistryBuilder;

fn default_listen() -> NetLocation {
    NetLocation::from_str("127.0.0.53:53", None).unwrap()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolvedServiceOptions {
    #[serde(default = "default_listen")]
    pub listen: NetLocation,
}

pub struct ResolvedService {
    tag: String,
    listen: NetLocation,
    socket: Mutex<Option<UdpSocket>>,
}

#[async_trait]
impl Lifecycle for ResolvedService {
    fn tag(&self) -> &str {
        &self.tag
    }

    async fn start(&self, stage: StartStage) -> std::io::Result<()> {
        if stage != StartStage::Start {
            return Ok(());
        }
        let addr = self.listen.to_socket_addr_nonblocking().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("listen address must be an ip address: {}", self.listen),
            )
        })?;
        let socket = UdpSocket::bind(addr).await?;
        info!("{} holding stub resolver socket {addr}", self.tag);
        *self.socket.lock() = Some(socket);
        Ok(())
    }

    async fn close(&self) -> std::io::Result<()> {
        self.socket.lock().take();
        Ok(())
    }
}

impl Service for ResolvedService {}

pub fn register_service(registry: &mut RegistryBuilder<dyn Service>) {
    registry
        .register::<ResolvedServiceOptions, _>(
            constant::SERVICE_TYPE_RESOLVED,
            |_ctx: &ConstructContext, tag, options| {
                Ok(Box::new(ResolvedService {
                    tag: tag.to_string(),
                    listen: options.listen,
                    socket: Mutex::new(None),
                }))
            },
        )
        .expect("registration conflict");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_binds_and_close_releases() {
        let service = ResolvedService {
            tag: "resolved".to_string(),
            listen: NetLocation::from_str("127.0.0.1:0", None).unwrap(),
            socket: Mutex::new(None),
        };
        service.start(StartStage::Initialize).await.unwrap();
        assert!(service.socket.lock().is_none());

        service.start(StartStage::Start).await.unwrap();
        assert!(service.socket.lock().is_some());

        service.close().await.unwrap();
        assert!(service.socket.lock().is_none());
    }
}
