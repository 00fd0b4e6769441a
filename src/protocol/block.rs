use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

use crate::adapter::{AsyncStream, Lifecycle, Outbound};
use crate::address::NetLocation;
use crate::constant;
use crate::registry::RegistryBuilder;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockOutboundOptions {}

/// Outbound that refuses every connection. Routing rules point traffic here
/// to drop it.
pub struct BlockOutbound {
    tag: String,
}

#[async_trait]
impl Lifecycle for BlockOutbound {
    fn tag(&self) -> &str {
        &self.tag
    }
}

#[async_trait]
impl Outbound for BlockOutbound {
    async fn dial(&self, destination: &NetLocation) -> std::io::Result<Box<dyn AsyncStream>> {
        debug!("{} blocked connection to {destination}", self.tag);
        Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            format!("connection to {destination} blocked"),
        ))
    }
}

pub fn register_outbound(registry: &mut RegistryBuilder<dyn Outbound>) {
    registry
        .register::<BlockOutboundOptions, _>(constant::TYPE_BLOCK, |_ctx, tag, _options| {
            Ok(Box::new(BlockOutbound {
                tag: tag.to_string(),
            }))
        })
        .expect("registration conflict");
}
