use async_trait::async_trait;
use serde::Deserialize;

use crate::adapter::{AsyncStream, Lifecycle, Outbound};
use crate::address::NetLocation;
use crate::constant;
use crate::registry::RegistryBuilder;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DnsOutboundOptions {}

/// Marker outbound that hands hijacked DNS queries to the configured DNS
/// transports. Datagram traffic is redirected by the routing layer before a
/// stream dial would happen, so stream dials against this outbound are a
/// configuration error.
pub struct DnsOutbound {
    tag: String,
}

#[async_trait]
impl Lifecycle for DnsOutbound {
    fn tag(&self) -> &str {
        &self.tag
    }
}

#[async_trait]
impl Outbound for DnsOutbound {
    async fn dial(&self, destination: &NetLocation) -> std::io::Result<Box<dyn AsyncStream>> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("dns outbound only serves hijacked queries, cannot dial {destination}"),
        ))
    }
}

pub fn register_outbound(registry: &mut RegistryBuilder<dyn Outbound>) {
    registry
        .register::<DnsOutboundOptions, _>(constant::TYPE_DNS, |_ctx, tag, _options| {
            Ok(Box::new(DnsOutbound {
                tag: tag.to_string(),
            }))
        })
        .expect("registration conflict");
}
