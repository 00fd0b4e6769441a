use std::net::SocketAddr;

use log::debug;
use tokio::net::UdpSocket;

use crate::obfs::Obfuscator;

/// UDP transport bind that applies an obfuscation transform to every
/// datagram: the transform's bytes are prepended on send and stripped on
/// receive. Datagrams the transform rejects are dropped without surfacing an
/// error to the reader.
///
/// One bind belongs to one tunnel session, and so does its transform
/// instance; sharing a transform across binds would entangle their state.
pub struct ObfuscatedBind {
    socket: UdpSocket,
    obfuscator: Option<Box<dyn Obfuscator>>,
}

impl ObfuscatedBind {
    pub fn new(socket: UdpSocket, obfuscator: Option<Box<dyn Obfuscator>>) -> Self {
        Self { socket, obfuscator }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub async fn send_to(&self, payload: &[u8], target: SocketAddr) -> std::io::Result<usize> {
        let Some(ref obfuscator) = self.obfuscator else {
            return self.socket.send_to(payload, target).await;
        };

        let header_len = obfuscator.obfuscated_len(payload.len());
        let mut datagram = vec![0u8; header_len + payload.len()];
        obfuscator.obfuscate(&mut datagram[..header_len], payload);
        datagram[header_len..].copy_from_slice(payload);
        self.socket.send_to(&datagram, target).await?;
        Ok(payload.len())
    }

    pub async fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        let Some(ref obfuscator) = self.obfuscator else {
            return self.socket.recv_from(buf).await;
        };

        let header_len = obfuscator.obfuscated_len(0);
        let mut datagram = vec![0u8; header_len + buf.len()];
        loop {
            let (n, from) = self.socket.recv_from(&mut datagram).await?;
            if n < header_len {
                debug!("dropping short datagram from {from}: {n} bytes");
                continue;
            }

            let (header, payload) = datagram[..n].split_at(header_len);
            let restored_len = obfuscator.deobfuscated_len(n - header_len);
            if !obfuscator.deobfuscate(&mut buf[..restored_len], header) {
                debug!("dropping rejected datagram from {from}");
                continue;
            }

            buf[restored_len..restored_len + payload.len()].copy_from_slice(payload);
            return Ok((restored_len + payload.len(), from));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obfs::new_obfuscator;

    async fn loopback_pair() -> (ObfuscatedBind, UdpSocket) {
        let bound = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let bind = ObfuscatedBind::new(bound, Some(new_obfuscator("counter").unwrap()));
        (bind, peer)
    }

    #[tokio::test]
    async fn test_send_prepends_counter_header() {
        let (bind, peer) = loopback_pair().await;
        let peer_addr = peer.local_addr().unwrap();

        bind.send_to(b"hello", peer_addr).await.unwrap();
        bind.send_to(b"world", peer_addr).await.unwrap();

        let mut raw = [0u8; 64];
        let (n, _) = peer.recv_from(&mut raw).await.unwrap();
        assert_eq!(n, 9);
        assert_eq!(u32::from_be_bytes(raw[..4].try_into().unwrap()), 0);
        assert_eq!(&raw[4..n], b"hello");

        let (n, _) = peer.recv_from(&mut raw).await.unwrap();
        assert_eq!(u32::from_be_bytes(raw[..4].try_into().unwrap()), 1);
        assert_eq!(&raw[4..n], b"world");
    }

    #[tokio::test]
    async fn test_recv_strips_header() {
        let (bind, peer) = loopback_pair().await;
        let bind_addr = bind.local_addr().unwrap();

        // Any header value must be accepted, including all-ones.
        let mut datagram = vec![0xff, 0xff, 0xff, 0xff];
        datagram.extend_from_slice(b"payload");
        peer.send_to(&datagram, bind_addr).await.unwrap();

        let mut buf = [0u8; 64];
        let (n, _) = bind.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"payload");
    }

    #[tokio::test]
    async fn test_short_datagrams_are_dropped() {
        let (bind, peer) = loopback_pair().await;
        let bind_addr = bind.local_addr().unwrap();

        peer.send_to(&[1, 2], bind_addr).await.unwrap();
        let mut datagram = vec![0, 0, 0, 7];
        datagram.extend_from_slice(b"ok");
        peer.send_to(&datagram, bind_addr).await.unwrap();

        // The two-byte datagram never surfaces; the next valid one does.
        let mut buf = [0u8; 64];
        let (n, _) = bind.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ok");
    }

    #[tokio::test]
    async fn test_passthrough_without_transform() {
        let bound = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer.local_addr().unwrap();
        let bind = ObfuscatedBind::new(bound, None);

        bind.send_to(b"plain", peer_addr).await.unwrap();
        let mut raw = [0u8; 64];
        let (n, _) = peer.recv_from(&mut raw).await.unwrap();
        assert_eq!(&raw[..n], b"plain");
    }
}
