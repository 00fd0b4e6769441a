//! Group outbounds: selection over other outbounds by tag.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::RwLock;
use serde::Deserialize;

use crate::adapter::{AsyncStream, ConstructContext, Lifecycle, Outbound, Router};
use crate::address::NetLocation;
use crate::constant;
use crate::registry::RegistryBuilder;

fn default_urltest_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectorOutboundOptions {
    pub outbounds: Vec<String>,
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UrlTestOutboundOptions {
    pub outbounds: Vec<String>,
    #[serde(default = "default_urltest_timeout_ms")]
    pub timeout_ms: u64,
}

/// Manually selected group: dials through the currently selected member.
pub struct SelectorOutbound {
    tag: String,
    router: Arc<dyn Router>,
    members: Vec<String>,
    selected: RwLock<String>,
}

impl SelectorOutbound {
    pub fn new(
        ctx: &ConstructContext,
        tag: &str,
        options: SelectorOutboundOptions,
    ) -> std::io::Result<Self> {
        if options.outbounds.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "selector needs at least one member outbound",
            ));
        }
        let selected = match options.default {
            Some(tag) => {
                if !options.outbounds.contains(&tag) {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("selector default {tag} is not a member"),
                    ));
                }
                tag
            }
            None => options.outbounds[0].clone(),
        };
        Ok(Self {
            tag: tag.to_string(),
            router: ctx.router.clone(),
            members: options.outbounds,
            selected: RwLock::new(selected),
        })
    }

    /// Switch the active member. Unknown tags are rejected.
    pub fn select(&self, member: &str) -> std::io::Result<()> {
        if !self.members.iter().any(|m| m == member) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{member} is not a member of selector {}", self.tag),
            ));
        }
        *self.selected.write() = member.to_string();
        Ok(())
    }

    pub fn selected(&self) -> String {
        self.selected.read().clone()
    }
}

#[async_trait]
impl Lifecycle for SelectorOutbound {
    fn tag(&self) -> &str {
        &self.tag
    }
}

#[async_trait]
impl Outbound for SelectorOutbound {
    async fn dial(&self, destination: &NetLocation) -> std::io::Result<Box<dyn AsyncStream>> {
        let member = self.selected();
        let outbound = self.router.outbound(&member).ok_or_else(|| {
            std::io::Error::other(format!("selected outbound {member} is not running"))
        })?;
        outbound.dial(destination).await
    }
}

/// Failover group: tries members in order until one dials within the
/// timeout.
pub struct UrlTestOutbound {
    tag: String,
    router: Arc<dyn Router>,
    members: Vec<String>,
    timeout: Duration,
}

#[async_trait]
impl Lifecycle for UrlTestOutbound {
    fn tag(&self) -> &str {
        &self.tag
    }
}

#[async_trait]
impl Outbound for UrlTestOutbound {
    async fn dial(&self, destination: &NetLocation) -> std::io::Result<Box<dyn AsyncStream>> {
        for member in &self.members {
            let Some(outbound) = self.router.outbound(member) else {
                warn!("{}: member {member} is not running, skipping", self.tag);
                continue;
            };
            match tokio::time::timeout(self.timeout, outbound.dial(destination)).await {
                Ok(Ok(stream)) => {
                    debug!("{}: dialed {destination} via {member}", self.tag);
                    return Ok(stream);
                }
                Ok(Err(e)) => {
                    debug!("{}: member {member} failed for {destination}: {e}", self.tag);
                }
                Err(_) => {
                    debug!("{}: member {member} timed out for {destination}", self.tag);
                }
            }
        }
        Err(std::io::Error::other(format!(
            "all members of {} failed to reach {destination}",
            self.tag
        )))
    }
}

pub fn register_selector(registry: &mut RegistryBuilder<dyn Outbound>) {
    registry
        .register::<SelectorOutboundOptions, _>(constant::TYPE_SELECTOR, |ctx, tag, options| {
            Ok(Box::new(SelectorOutbound::new(ctx, tag, options)?))
        })
        .expect("registration conflict");
}

pub fn register_urltest(registry: &mut RegistryBuilder<dyn Outbound>) {
    registry
        .register::<UrlTestOutboundOptions, _>(constant::TYPE_URLTEST, |ctx, tag, options| {
            if options.outbounds.is_empty() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "urltest needs at least one member outbound",
                ));
            }
            Ok(Box::new(UrlTestOutbound {
                tag: tag.to_string(),
                router: ctx.router.clone(),
                members: options.outbounds,
                timeout: Duration::from_millis(options.timeout_ms),
            }))
        })
        .expect("registration conflict");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::null_ctx as test_ctx;

    #[test]
    fn test_selector_defaults_to_first_member() {
        let options: SelectorOutboundOptions =
            serde_yaml::from_str("outbounds: [a, b, c]").unwrap();
        let selector = SelectorOutbound::new(&test_ctx(), "pick", options).unwrap();
        assert_eq!(selector.selected(), "a");

        selector.select("c").unwrap();
        assert_eq!(selector.selected(), "c");
        assert!(selector.select("nope").is_err());
    }

    #[test]
    fn test_selector_rejects_foreign_default() {
        let options: SelectorOutboundOptions =
            serde_yaml::from_str("outbounds: [a]\ndefault: b").unwrap();
        assert!(SelectorOutbound::new(&test_ctx(), "pick", options).is_err());
    }
}
