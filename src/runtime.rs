//! Component runtime: owns every constructed component, hands out the
//! [`Router`] handle, and drives the staged lifecycle.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use log::{error, info};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::adapter::{
    AsyncStream, ConstructContext, DnsTransport, Endpoint, Inbound, Lifecycle, Outbound, Router,
    Service, StartStage,
};
use crate::address::NetLocation;
use crate::config::Config;
use crate::dialer::Dialer;
use crate::profile::RuntimeRegistries;

#[derive(Default)]
struct Components {
    inbounds: Vec<Arc<dyn Inbound>>,
    outbounds: FxHashMap<String, Arc<dyn Outbound>>,
    outbound_order: Vec<String>,
    endpoints: Vec<Arc<dyn Endpoint>>,
    dns_transports: Vec<Arc<dyn DnsTransport>>,
    services: Vec<Arc<dyn Service>>,
}

pub struct Runtime {
    dialer: Arc<dyn Dialer>,
    components: RwLock<Components>,
    // Handed out as the Router handle inside ConstructContext.
    weak_self: Weak<Runtime>,
}

impl Runtime {
    pub fn new(dialer: Arc<dyn Dialer>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            dialer,
            components: RwLock::new(Components::default()),
            weak_self: weak_self.clone(),
        })
    }

    pub fn construct_context(&self) -> ConstructContext {
        let router = self.weak_self.upgrade().expect("runtime dropped");
        ConstructContext::new(router, self.dialer.clone())
    }

    /// Construct every component in `config` against the compiled profile's
    /// registries. A component that fails to construct is reported and
    /// skipped; the rest of the config still loads. Returns the number of
    /// failures.
    pub fn load(&self, registries: &RuntimeRegistries, config: Config) -> usize {
        let ctx = self.construct_context();
        let mut failures = 0usize;

        for entry in config.outbounds {
            match registries
                .outbound
                .construct(&ctx, &entry.type_tag, &entry.tag, entry.options)
            {
                Ok(outbound) => {
                    let mut components = self.components.write();
                    if components.outbounds.contains_key(&entry.tag) {
                        error!("duplicate outbound tag: {}", entry.tag);
                        failures += 1;
                        continue;
                    }
                    components.outbound_order.push(entry.tag.clone());
                    components.outbounds.insert(entry.tag, Arc::from(outbound));
                }
                Err(e) => {
                    error!("failed to create outbound {}: {e}", entry.tag);
                    failures += 1;
                }
            }
        }

        for entry in config.inbounds {
            match registries
                .inbound
                .construct(&ctx, &entry.type_tag, &entry.tag, entry.options)
            {
                Ok(inbound) => self.components.write().inbounds.push(Arc::from(inbound)),
                Err(e) => {
                    error!("failed to create inbound {}: {e}", entry.tag);
                    failures += 1;
                }
            }
        }

        for entry in config.endpoints {
            match registries
                .endpoint
                .construct(&ctx, &entry.type_tag, &entry.tag, entry.options)
            {
                Ok(endpoint) => self.components.write().endpoints.push(Arc::from(endpoint)),
                Err(e) => {
                    error!("failed to create endpoint {}: {e}", entry.tag);
                    failures += 1;
                }
            }
        }

        for entry in config.dns {
            match registries
                .dns_transport
                .construct(&ctx, &entry.type_tag, &entry.tag, entry.options)
            {
                Ok(transport) => self
                    .components
                    .write()
                    .dns_transports
                    .push(Arc::from(transport)),
                Err(e) => {
                    error!("failed to create dns transport {}: {e}", entry.tag);
                    failures += 1;
                }
            }
        }

        for entry in config.services {
            match registries
                .service
                .construct(&ctx, &entry.type_tag, &entry.tag, entry.options)
            {
                Ok(service) => self.components.write().services.push(Arc::from(service)),
                Err(e) => {
                    error!("failed to create service {}: {e}", entry.tag);
                    failures += 1;
                }
            }
        }

        failures
    }

    fn lifecycle_order(&self) -> Vec<Arc<dyn Lifecycle>> {
        let components = self.components.read();
        let mut all: Vec<Arc<dyn Lifecycle>> = Vec::new();
        // Traffic receivers come up last and go down first.
        for transport in &components.dns_transports {
            all.push(transport.clone() as Arc<dyn Lifecycle>);
        }
        for tag in &components.outbound_order {
            all.push(components.outbounds[tag].clone() as Arc<dyn Lifecycle>);
        }
        for endpoint in &components.endpoints {
            all.push(endpoint.clone() as Arc<dyn Lifecycle>);
        }
        for service in &components.services {
            all.push(service.clone() as Arc<dyn Lifecycle>);
        }
        for inbound in &components.inbounds {
            all.push(inbound.clone() as Arc<dyn Lifecycle>);
        }
        all
    }

    /// Run all components through every start stage in order. A component
    /// failing a stage is reported and left stopped; unrelated components
    /// keep starting. Returns the number of failures.
    pub async fn start_all(&self) -> usize {
        let all = self.lifecycle_order();
        let mut failures = 0usize;
        for stage in StartStage::ALL {
            for component in &all {
                if let Err(e) = component.start(stage).await {
                    error!("failed to start {}: {e}", component.tag());
                    failures += 1;
                }
            }
        }
        info!("started {} components", all.len());
        failures
    }

    pub async fn close_all(&self) {
        let mut all = self.lifecycle_order();
        all.reverse();
        for component in &all {
            if let Err(e) = component.close().await {
                error!("failed to close {}: {e}", component.tag());
            }
        }
        *self.components.write() = Components::default();
    }
}

#[async_trait]
impl Router for Runtime {
    fn outbound(&self, tag: &str) -> Option<Arc<dyn Outbound>> {
        self.components.read().outbounds.get(tag).cloned()
    }

    async fn route(&self, destination: &NetLocation) -> std::io::Result<Box<dyn AsyncStream>> {
        let outbound = {
            let components = self.components.read();
            let Some(tag) = components.outbound_order.first() else {
                return Err(std::io::Error::other("no outbounds configured"));
            };
            components.outbounds[tag].clone()
        };
        outbound.dial(destination).await
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::address::Address;
    use crate::dialer::DirectDialer;
    use crate::profile;
    use crate::test_util::spawn_echo_server;

    fn test_runtime() -> Arc<Runtime> {
        Runtime::new(Arc::new(DirectDialer::default()))
    }

    #[tokio::test]
    async fn test_load_isolates_component_failures() {
        let config: Config = serde_yaml::from_str(
            r#"
outbounds:
  - {type: direct, tag: out}
  - {type: vmess, tag: legacy}
  - {type: nonsense, tag: typo}
  - {type: block, tag: blackhole}
"#,
        )
        .unwrap();

        let runtime = test_runtime();
        let failures = runtime.load(&profile::runtime_registries(), config);
        assert_eq!(failures, 2);
        // The healthy components still loaded.
        assert!(runtime.outbound("out").is_some());
        assert!(runtime.outbound("blackhole").is_some());
        assert!(runtime.outbound("legacy").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_outbound_tags_are_rejected() {
        let config: Config = serde_yaml::from_str(
            r#"
outbounds:
  - {type: direct, tag: out}
  - {type: block, tag: out}
"#,
        )
        .unwrap();

        let runtime = test_runtime();
        let failures = runtime.load(&profile::runtime_registries(), config);
        assert_eq!(failures, 1);
    }

    #[tokio::test]
    async fn test_route_uses_first_outbound() {
        let echo_addr = spawn_echo_server().await;
        let config: Config =
            serde_yaml::from_str("outbounds: [{type: direct, tag: out}]").unwrap();

        let runtime = test_runtime();
        assert_eq!(runtime.load(&profile::runtime_registries(), config), 0);

        let destination = NetLocation::new(
            Address::from(&echo_addr.ip().to_string()).unwrap(),
            echo_addr.port(),
        );
        let mut stream = runtime.route(&destination).await.unwrap();
        stream.write_all(b"hi").await.unwrap();
        let mut buf = [0u8; 2];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hi");

        runtime.close_all().await;
        assert!(runtime.outbound("out").is_none());
    }

    #[tokio::test]
    async fn test_start_all_reports_failures_without_cascading() {
        // Two mixed inbounds on the same port: the second one fails to bind
        // at the Start stage, the first one keeps running.
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let config: Config = serde_yaml::from_str(&format!(
            r#"
inbounds:
  - {{type: mixed, tag: a, listen: "127.0.0.1:{port}"}}
  - {{type: mixed, tag: b, listen: "127.0.0.1:{port}"}}
outbounds:
  - {{type: direct, tag: out}}
"#
        ))
        .unwrap();

        let runtime = test_runtime();
        assert_eq!(runtime.load(&profile::runtime_registries(), config), 0);
        let failures = runtime.start_all().await;
        assert_eq!(failures, 1);
        runtime.close_all().await;
    }
}

