//! hickory-dns backed transports for udp://, tcp://, tls:// and https://
//! servers.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use hickory_resolver::Resolver;
use hickory_resolver::config::{ConnectionConfig, NameServerConfig, ResolverConfig};
use hickory_resolver::net::runtime::TokioRuntimeProvider;
use log::debug;
use serde::Deserialize;

use crate::adapter::{DnsTransport, Lifecycle};
use crate::address::NetLocation;

fn default_doh_path() -> String {
    "/dns-query".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HickoryDnsOptions {
    pub server: NetLocation,
    /// TLS server name, required for tls and https transports when the
    /// server is given as an ip address.
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default = "default_doh_path")]
    pub path: String,
}

impl HickoryDnsOptions {
    fn server_addr(&self) -> std::io::Result<SocketAddr> {
        self.server.to_socket_addr_nonblocking().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("dns server must be an ip address: {}", self.server),
            )
        })
    }

    fn tls_name(&self) -> std::io::Result<Arc<str>> {
        match self.server_name {
            Some(ref name) => Ok(Arc::from(name.as_str())),
            None => match self.server.address().hostname() {
                Some(name) => Ok(Arc::from(name)),
                None => Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("server_name is required for {}", self.server),
                )),
            },
        }
    }
}

pub struct HickoryTransport {
    tag: String,
    inner: Resolver<TokioRuntimeProvider>,
    description: String,
}

impl HickoryTransport {
    pub fn udp(tag: &str, options: HickoryDnsOptions) -> std::io::Result<Self> {
        let addr = options.server_addr()?;
        let mut conn_config = ConnectionConfig::udp();
        conn_config.port = addr.port();
        Self::build(tag, addr.ip(), conn_config, format!("udp://{addr}"))
    }

    pub fn tcp(tag: &str, options: HickoryDnsOptions) -> std::io::Result<Self> {
        let addr = options.server_addr()?;
        let mut conn_config = ConnectionConfig::tcp();
        conn_config.port = addr.port();
        Self::build(tag, addr.ip(), conn_config, format!("tcp://{addr}"))
    }

    pub fn tls(tag: &str, options: HickoryDnsOptions) -> std::io::Result<Self> {
        let addr = options.server_addr()?;
        let server_name = options.tls_name()?;
        let mut conn_config = ConnectionConfig::tls(server_name.clone());
        conn_config.port = addr.port();
        Self::build(
            tag,
            addr.ip(),
            conn_config,
            format!("tls://{addr}#{server_name}"),
        )
    }

    pub fn https(tag: &str, options: HickoryDnsOptions) -> std::io::Result<Self> {
        let addr = options.server_addr()?;
        let server_name = options.tls_name()?;
        let path: Arc<str> = Arc::from(options.path.as_str());
        let mut conn_config = ConnectionConfig::https(server_name.clone(), Some(path));
        conn_config.port = addr.port();
        Self::build(
            tag,
            addr.ip(),
            conn_config,
            format!("https://{server_name}"),
        )
    }

    fn build(
        tag: &str,
        ip: IpAddr,
        conn_config: ConnectionConfig,
        description: String,
    ) -> std::io::Result<Self> {
        let ns_config = NameServerConfig::new(ip, true, vec![conn_config]);
        let config = ResolverConfig::from_parts(None, vec![], vec![ns_config]);
        let builder =
            Resolver::builder_with_config(config, TokioRuntimeProvider::default());
        let resolver = builder
            .build()
            .map_err(|e| std::io::Error::other(format!("failed to build resolver: {e}")))?;
        Ok(Self {
            tag: tag.to_string(),
            inner: resolver,
            description,
        })
    }
}

#[async_trait]
impl Lifecycle for HickoryTransport {
    fn tag(&self) -> &str {
        &self.tag
    }
}

#[async_trait]
impl DnsTransport for HickoryTransport {
    async fn lookup(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
        let response = self
            .inner
            .lookup_ip(host)
            .await
            .map_err(|e| std::io::Error::other(format!("dns lookup failed: {e}")))?;
        let addrs: Vec<IpAddr> = response.iter().filter(|ip| !ip.is_unspecified()).collect();
        if addrs.is_empty() {
            return Err(std::io::Error::other(format!(
                "dns lookup returned no addresses for {host}"
            )));
        }
        debug!("{} ({}) resolved {host} -> {addrs:?}", self.tag, self.description);
        Ok(addrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(yaml: &str) -> HickoryDnsOptions {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[tokio::test]
    async fn test_udp_requires_ip_server() {
        let err = HickoryTransport::udp("dns", options("server: dns.example.com:53")).err().unwrap();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
        assert!(HickoryTransport::udp("dns", options("server: 9.9.9.9:53")).is_ok());
    }

    #[tokio::test]
    async fn test_tls_requires_server_name() {
        let err = HickoryTransport::tls("dot", options("server: 1.1.1.1:853")).err().unwrap();
        assert!(err.to_string().contains("server_name"));
        assert!(
            HickoryTransport::tls(
                "dot",
                options("server: 1.1.1.1:853\nserver_name: one.one.one.one"),
            )
            .is_ok()
        );
    }

    #[tokio::test]
    async fn test_doh_path_defaults() {
        let parsed = options("server: 1.1.1.1:443\nserver_name: cloudflare-dns.com");
        assert_eq!(parsed.path, "/dns-query");
    }
}
