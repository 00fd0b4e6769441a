use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use log::debug;
use tokio::net::{TcpStream, UdpSocket};

use crate::adapter::{AsyncStream, Network};
use crate::address::{IpSubnet, NetLocation};

use super::device::VirtualInterface;

const MIN_MTU: u32 = 576;
const MAX_MTU: u32 = 65535;

/// In-process virtual interface backed by the host network stack.
///
/// Holds the tunnel's interface addresses and MTU and hands out ordinary
/// dial/listen connections. Stream dials and packet listeners are only
/// served once the interface has been started.
pub struct NetworkTun {
    addresses: Vec<IpSubnet>,
    mtu: u32,
    started: AtomicBool,
}

impl NetworkTun {
    pub fn new(addresses: &[IpSubnet], mtu: u32) -> std::io::Result<Self> {
        if addresses.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "tunnel interface requires at least one address",
            ));
        }
        if !(MIN_MTU..=MAX_MTU).contains(&mtu) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("tunnel mtu {mtu} out of range {MIN_MTU}..{MAX_MTU}"),
            ));
        }
        Ok(Self {
            addresses: addresses.to_vec(),
            mtu,
            started: AtomicBool::new(false),
        })
    }

    pub fn mtu(&self) -> u32 {
        self.mtu
    }

    pub fn addresses(&self) -> &[IpSubnet] {
        &self.addresses
    }

    fn check_started(&self) -> std::io::Result<()> {
        if !self.started.load(Ordering::Acquire) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "tunnel interface is not started",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl VirtualInterface for NetworkTun {
    fn start(&self) -> std::io::Result<()> {
        self.started.store(true, Ordering::Release);
        debug!(
            "tunnel interface up: addresses={:?} mtu={}",
            self.addresses
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>(),
            self.mtu
        );
        Ok(())
    }

    async fn dial_context(
        &self,
        network: Network,
        destination: &NetLocation,
    ) -> std::io::Result<Box<dyn AsyncStream>> {
        self.check_started()?;
        match network {
            Network::Tcp => {
                let stream = match destination.to_socket_addr_nonblocking() {
                    Some(addr) => TcpStream::connect(addr).await?,
                    None => TcpStream::connect(destination.to_string()).await?,
                };
                Ok(Box::new(stream))
            }
            Network::Udp => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "udp streams are not dialed over the tunnel interface, use listen_packet",
            )),
        }
    }

    async fn listen_packet(&self, destination: &NetLocation) -> std::io::Result<UdpSocket> {
        self.check_started()?;
        let bind_ip: IpAddr = match destination.to_socket_addr_nonblocking() {
            Some(addr) if addr.is_ipv6() => std::net::Ipv6Addr::UNSPECIFIED.into(),
            _ => std::net::Ipv4Addr::UNSPECIFIED.into(),
        };
        UdpSocket::bind(SocketAddr::new(bind_ip, 0)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;

    fn subnet(s: &str) -> IpSubnet {
        IpSubnet::from_str(s).unwrap()
    }

    #[test]
    fn test_rejects_empty_addresses() {
        let err = NetworkTun::new(&[], 1408).err().unwrap();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_rejects_bad_mtu() {
        assert!(NetworkTun::new(&[subnet("10.8.0.2/32")], 100).is_err());
        assert!(NetworkTun::new(&[subnet("10.8.0.2/32")], 1408).is_ok());
    }

    #[tokio::test]
    async fn test_dial_requires_start() {
        let tun = NetworkTun::new(&[subnet("10.8.0.2/32")], 1408).unwrap();
        let destination = NetLocation::new(Address::from("127.0.0.1").unwrap(), 1);
        let err = tun
            .dial_context(Network::Tcp, &destination)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), std::io::ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn test_listen_packet_after_start() {
        let tun = NetworkTun::new(&[subnet("10.8.0.2/32")], 1408).unwrap();
        tun.start().unwrap();
        let destination = NetLocation::new(Address::from("127.0.0.1").unwrap(), 53);
        let socket = tun.listen_packet(&destination).await.unwrap();
        assert!(socket.local_addr().unwrap().ip().is_unspecified());
    }
}
