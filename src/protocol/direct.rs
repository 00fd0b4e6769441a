use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::adapter::{AsyncStream, ConstructContext, Lifecycle, Outbound};
use crate::address::{Address, NetLocation};
use crate::constant;
use crate::dialer::Dialer;
use crate::registry::RegistryBuilder;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectOutboundOptions {
    /// Rewrite the destination host before dialing.
    #[serde(default)]
    pub override_address: Option<String>,
    /// Rewrite the destination port before dialing.
    #[serde(default)]
    pub override_port: Option<u16>,
}

/// Plain pass-through outbound: dials the destination on the host stack.
pub struct DirectOutbound {
    tag: String,
    dialer: Arc<dyn Dialer>,
    override_address: Option<Address>,
    override_port: Option<u16>,
}

impl DirectOutbound {
    pub fn new(
        ctx: &ConstructContext,
        tag: &str,
        options: DirectOutboundOptions,
    ) -> std::io::Result<Self> {
        let override_address = match options.override_address {
            Some(ref s) => Some(Address::from(s)?),
            None => None,
        };
        Ok(Self {
            tag: tag.to_string(),
            dialer: ctx.dialer.clone(),
            override_address,
            override_port: options.override_port,
        })
    }
}

#[async_trait]
impl Lifecycle for DirectOutbound {
    fn tag(&self) -> &str {
        &self.tag
    }
}

#[async_trait]
impl Outbound for DirectOutbound {
    async fn dial(&self, destination: &NetLocation) -> std::io::Result<Box<dyn AsyncStream>> {
        let address = self
            .override_address
            .clone()
            .unwrap_or_else(|| destination.address().clone());
        let port = self.override_port.unwrap_or_else(|| destination.port());
        let target = NetLocation::new(address, port);
        let stream = self.dialer.connect_tcp(&target).await?;
        Ok(Box::new(stream))
    }
}

pub fn register_outbound(registry: &mut RegistryBuilder<dyn Outbound>) {
    registry
        .register::<DirectOutboundOptions, _>(constant::TYPE_DIRECT, |ctx, tag, options| {
            Ok(Box::new(DirectOutbound::new(ctx, tag, options)?))
        })
        .expect("registration conflict");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_address_is_validated() {
        let options: DirectOutboundOptions =
            serde_yaml::from_str("override_address: \"!!bad!!\"").unwrap();
        assert!(Address::from(options.override_address.as_deref().unwrap()).is_err());
    }
}
