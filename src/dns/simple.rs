use std::net::{IpAddr, Ipv4Addr};

use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::adapter::{DnsTransport, Lifecycle};
use crate::address::IpSubnet;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostsOptions {
    #[serde(default)]
    pub entries: FxHashMap<String, Vec<IpAddr>>,
}

/// Static hostname map.
pub struct HostsTransport {
    tag: String,
    entries: FxHashMap<String, Vec<IpAddr>>,
}

impl HostsTransport {
    pub fn new(tag: &str, options: HostsOptions) -> Self {
        Self {
            tag: tag.to_string(),
            entries: options.entries,
        }
    }
}

#[async_trait]
impl Lifecycle for HostsTransport {
    fn tag(&self) -> &str {
        &self.tag
    }
}

#[async_trait]
impl DnsTransport for HostsTransport {
    async fn lookup(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
        match self.entries.get(host) {
            Some(addrs) if !addrs.is_empty() => Ok(addrs.clone()),
            _ => Err(std::io::Error::other(format!(
                "no hosts entry for {host}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalDnsOptions {}

/// System resolver.
pub struct LocalTransport {
    tag: String,
}

impl LocalTransport {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
        }
    }
}

#[async_trait]
impl Lifecycle for LocalTransport {
    fn tag(&self) -> &str {
        &self.tag
    }
}

#[async_trait]
impl DnsTransport for LocalTransport {
    async fn lookup(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
        // Port 0 satisfies lookup_host; only the addresses matter.
        let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
            .await?
            .map(|addr| addr.ip())
            .filter(|ip| !ip.is_unspecified())
            .collect();
        if addrs.is_empty() {
            return Err(std::io::Error::other(format!(
                "system resolver returned no addresses for {host}"
            )));
        }
        debug!("{} resolved {host} -> {addrs:?}", self.tag);
        Ok(addrs)
    }
}

fn default_fakeip_range() -> IpSubnet {
    IpSubnet::from_str("198.18.0.0/15").unwrap()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FakeIpOptions {
    #[serde(default = "default_fakeip_range")]
    pub inet4_range: IpSubnet,
}

/// Allocates stable fake addresses per hostname out of a reserved range, so
/// tun-routed clients can be matched back to the name they asked for.
pub struct FakeIpTransport {
    tag: String,
    base: u32,
    capacity: u32,
    state: Mutex<FakeIpState>,
}

struct FakeIpState {
    by_name: FxHashMap<String, Ipv4Addr>,
    next: u32,
}

impl FakeIpTransport {
    pub fn new(tag: &str, options: FakeIpOptions) -> std::io::Result<Self> {
        let IpAddr::V4(base) = options.inet4_range.addr() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "fakeip range must be an ipv4 subnet",
            ));
        };
        let host_bits = 32 - options.inet4_range.prefix_len();
        let capacity = if host_bits >= 32 {
            u32::MAX
        } else {
            (1u32 << host_bits) - 2
        };
        if capacity == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("fakeip range {} has no usable addresses", options.inet4_range),
            ));
        }
        Ok(Self {
            tag: tag.to_string(),
            base: u32::from(base),
            capacity,
            state: Mutex::new(FakeIpState {
                by_name: FxHashMap::default(),
                // .0 is the network address, start allocating at .1
                next: 1,
            }),
        })
    }
}

#[async_trait]
impl Lifecycle for FakeIpTransport {
    fn tag(&self) -> &str {
        &self.tag
    }
}

#[async_trait]
impl DnsTransport for FakeIpTransport {
    async fn lookup(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
        let mut state = self.state.lock();
        if let Some(addr) = state.by_name.get(host) {
            return Ok(vec![IpAddr::V4(*addr)]);
        }
        if state.next > self.capacity {
            return Err(std::io::Error::other(format!(
                "fakeip range exhausted after {} allocations",
                self.capacity
            )));
        }
        let addr = Ipv4Addr::from(self.base + state.next);
        state.next += 1;
        state.by_name.insert(host.to_string(), addr);
        debug!("{} assigned {addr} to {host}", self.tag);
        Ok(vec![IpAddr::V4(addr)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hosts_lookup() {
        let options: HostsOptions = serde_yaml::from_str(
            r#"
entries:
  router.lan: [192.168.1.1]
  dual.lan: [10.0.0.1, "fd00::1"]
"#,
        )
        .unwrap();
        let transport = HostsTransport::new("hosts", options);
        assert_eq!(
            transport.lookup("router.lan").await.unwrap(),
            vec!["192.168.1.1".parse::<IpAddr>().unwrap()]
        );
        assert_eq!(transport.lookup("dual.lan").await.unwrap().len(), 2);
        assert!(transport.lookup("missing.lan").await.is_err());
    }

    #[tokio::test]
    async fn test_fakeip_allocations_are_stable() {
        let options: FakeIpOptions = serde_yaml::from_str("{}").unwrap();
        let transport = FakeIpTransport::new("fakeip", options).unwrap();

        let first = transport.lookup("a.example").await.unwrap();
        let second = transport.lookup("b.example").await.unwrap();
        assert_ne!(first, second);
        assert_eq!(transport.lookup("a.example").await.unwrap(), first);
        assert_eq!(first, vec!["198.18.0.1".parse::<IpAddr>().unwrap()]);
    }

    #[tokio::test]
    async fn test_fakeip_range_exhaustion() {
        let options: FakeIpOptions =
            serde_yaml::from_str("inet4_range: 10.99.0.0/30").unwrap();
        let transport = FakeIpTransport::new("fakeip", options).unwrap();

        transport.lookup("one.example").await.unwrap();
        transport.lookup("two.example").await.unwrap();
        assert!(transport.lookup("three.example").await.is_err());
    }

    #[test]
    fn test_fakeip_rejects_ipv6_range() {
        let options: FakeIpOptions =
            serde_yaml::from_str("inet4_range: \"fd00::/64\"").unwrap();
        assert!(FakeIpTransport::new("fakeip", options).is_err());
    }
}
