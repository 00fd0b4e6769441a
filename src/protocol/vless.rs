use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::adapter::{AsyncStream, ConstructContext, Lifecycle, Outbound};
use crate::address::{Address, NetLocation};
use crate::constant;
use crate::dialer::Dialer;
use crate::registry::RegistryBuilder;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VlessOutboundOptions {
    pub server: NetLocation,
    pub user_id: String,
    #[serde(default = "default_true")]
    pub udp_enabled: bool,
}

/// VLESS client outbound: connects to the server, writes the request header
/// for the destination, and checks the response header version.
pub struct VlessOutbound {
    tag: String,
    dialer: Arc<dyn Dialer>,
    server: NetLocation,
    user_id: [u8; 16],
}

impl VlessOutbound {
    pub fn new(
        ctx: &ConstructContext,
        tag: &str,
        options: VlessOutboundOptions,
    ) -> std::io::Result<Self> {
        Ok(Self {
            tag: tag.to_string(),
            dialer: ctx.dialer.clone(),
            server: options.server,
            user_id: parse_uuid(&options.user_id)?,
        })
    }
}

/// Parse a hyphenated or bare hex UUID into its 16 bytes.
pub fn parse_uuid(s: &str) -> std::io::Result<[u8; 16]> {
    let hex: String = s.chars().filter(|c| *c != '-').collect();
    if hex.len() != 32 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("invalid uuid: {s}"),
        ));
    }
    let mut bytes = [0u8; 16];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid uuid: {s}"),
            )
        })?;
    }
    Ok(bytes)
}

#[async_trait]
impl Lifecycle for VlessOutbound {
    fn tag(&self) -> &str {
        &self.tag
    }
}

#[async_trait]
impl Outbound for VlessOutbound {
    async fn dial(&self, destination: &NetLocation) -> std::io::Result<Box<dyn AsyncStream>> {
        let mut stream = self.dialer.connect_tcp(&self.server).await?;

        // version + user id + addon length + command + port + address type
        let mut header = Vec::with_capacity(1 + 16 + 1 + 1 + 2 + 1 + 16);
        header.push(0u8);
        header.extend_from_slice(&self.user_id);
        header.push(0u8);
        header.push(1u8); // tcp
        header.extend_from_slice(&destination.port().to_be_bytes());
        match destination.address() {
            Address::Ipv4(addr) => {
                header.push(1u8);
                header.extend_from_slice(&addr.octets());
            }
            Address::Hostname(hostname) => {
                if hostname.len() > 255 {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("hostname is too long: {hostname}"),
                    ));
                }
                header.push(2u8);
                header.push(hostname.len() as u8);
                header.extend_from_slice(hostname.as_bytes());
            }
            Address::Ipv6(addr) => {
                header.push(3u8);
                header.extend_from_slice(&addr.octets());
            }
        }
        stream.write_all(&header).await?;
        stream.flush().await?;

        let mut response_header = [0u8; 2];
        stream.read_exact(&mut response_header).await?;
        if response_header[0] != 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unexpected response version: {}", response_header[0]),
            ));
        }
        // Skip response addons.
        let addon_len = response_header[1] as usize;
        if addon_len > 0 {
            let mut addons = vec![0u8; addon_len];
            stream.read_exact(&mut addons).await?;
        }

        Ok(Box::new(stream))
    }
}

pub fn register_outbound(registry: &mut RegistryBuilder<dyn Outbound>) {
    registry
        .register::<VlessOutboundOptions, _>(constant::TYPE_VLESS, |ctx, tag, options| {
            Ok(Box::new(VlessOutbound::new(ctx, tag, options)?))
        })
        .expect("registration conflict");
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;
    use crate::test_util::null_ctx;

    #[test]
    fn test_parse_uuid() {
        let parsed = parse_uuid("b831381d-6324-4d53-ad4f-8cda48b30811").unwrap();
        assert_eq!(parsed[0], 0xb8);
        assert_eq!(parsed[15], 0x11);
        assert_eq!(
            parse_uuid("b831381d63244d53ad4f8cda48b30811").unwrap(),
            parsed
        );
        assert!(parse_uuid("too-short").is_err());
        assert!(parse_uuid("zz31381d-6324-4d53-ad4f-8cda48b30811").is_err());
    }

    #[tokio::test]
    async fn test_dial_writes_request_header() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server_addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut header = [0u8; 26];
            stream.read_exact(&mut header).await.unwrap();
            stream.write_all(&[0u8, 0u8]).await.unwrap();
            header
        });

        let ctx = null_ctx();
        let options = VlessOutboundOptions {
            server: NetLocation::from_str(&server_addr.to_string(), None).unwrap(),
            user_id: "b831381d-6324-4d53-ad4f-8cda48b30811".to_string(),
            udp_enabled: true,
        };
        let outbound = VlessOutbound::new(&ctx, "vless-out", options).unwrap();

        let destination = NetLocation::new(Address::from("10.1.2.3").unwrap(), 443);
        outbound.dial(&destination).await.unwrap();

        let header = server.await.unwrap();
        assert_eq!(header[0], 0); // version
        assert_eq!(
            &header[1..17],
            &parse_uuid("b831381d-6324-4d53-ad4f-8cda48b30811").unwrap()
        );
        assert_eq!(header[17], 0); // no addons
        assert_eq!(header[18], 1); // tcp
        assert_eq!(u16::from_be_bytes([header[19], header[20]]), 443);
        assert_eq!(header[21], 1); // ipv4
        assert_eq!(&header[22..26], &[10, 1, 2, 3]);
    }
}
