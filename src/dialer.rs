//! Socket creation and dialing.
//!
//! The [`Dialer`] trait is the seam between components and the host network
//! stack: outbounds dial TCP through it, and the tunnel transport bind gets
//! its UDP socket from it, so an embedder can interpose socket protection or
//! device binding in one place.

use async_trait::async_trait;
use log::debug;
use tokio::net::{TcpStream, UdpSocket};

use crate::address::NetLocation;

#[async_trait]
pub trait Dialer: Send + Sync {
    async fn connect_tcp(&self, destination: &NetLocation) -> std::io::Result<TcpStream>;

    fn bind_udp(&self) -> std::io::Result<UdpSocket>;
}

/// Dialer backed directly by the host stack, optionally pinned to a network
/// device on platforms that support `SO_BINDTODEVICE`.
#[derive(Debug, Default)]
pub struct DirectDialer {
    bind_interface: Option<String>,
}

impl DirectDialer {
    pub fn new(bind_interface: Option<String>) -> Self {
        Self { bind_interface }
    }
}

#[async_trait]
impl Dialer for DirectDialer {
    async fn connect_tcp(&self, destination: &NetLocation) -> std::io::Result<TcpStream> {
        let stream = match destination.to_socket_addr_nonblocking() {
            Some(addr) => {
                let socket = new_tcp_socket(self.bind_interface.clone(), addr.is_ipv6())?;
                socket.connect(addr).await?
            }
            // Hostname targets resolve through the system resolver.
            None => TcpStream::connect(destination.to_string()).await?,
        };
        debug!("dialed tcp connection to {destination}");
        Ok(stream)
    }

    fn bind_udp(&self) -> std::io::Result<UdpSocket> {
        new_udp_socket(self.bind_interface.clone())
    }
}

pub fn new_udp_socket(bind_interface: Option<String>) -> std::io::Result<UdpSocket> {
    let std_socket = std::net::UdpSocket::bind("[::]:0")?;
    std_socket.set_nonblocking(true)?;

    let tokio_socket = UdpSocket::from_std(std_socket)?;
    if let Some(_b) = bind_interface {
        #[cfg(any(target_os = "android", target_os = "fuchsia", target_os = "linux"))]
        tokio_socket.bind_device(Some(_b.as_bytes()))?;

        #[cfg(not(any(target_os = "android", target_os = "fuchsia", target_os = "linux")))]
        return Err(std::io::Error::other(
            "bind_interface is not supported on this platform",
        ));
    }

    Ok(tokio_socket)
}

pub fn new_tcp_socket(
    bind_interface: Option<String>,
    is_ipv6: bool,
) -> std::io::Result<tokio::net::TcpSocket> {
    let tcp_socket = if is_ipv6 {
        tokio::net::TcpSocket::new_v6()?
    } else {
        tokio::net::TcpSocket::new_v4()?
    };

    if let Some(_b) = bind_interface {
        #[cfg(any(target_os = "android", target_os = "fuchsia", target_os = "linux"))]
        tcp_socket.bind_device(Some(_b.as_bytes()))?;

        #[cfg(not(any(target_os = "android", target_os = "fuchsia", target_os = "linux")))]
        return Err(std::io::Error::other(
            "bind_interface is not supported on this platform",
        ));
    }

    Ok(tcp_socket)
}
