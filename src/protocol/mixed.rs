//! Mixed SOCKS5 + HTTP CONNECT inbound.
//!
//! The protocol is detected from the first byte of each connection: 0x05 is
//! the SOCKS5 version byte, anything else is treated as HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use crate::adapter::{ConstructContext, Inbound, Lifecycle, Router, StartStage};
use crate::address::{Address, NetLocation};
use crate::constant;
use crate::registry::RegistryBuilder;

const VER_SOCKS5: u8 = 0x05;
const SOCKS5_METHOD_NONE: u8 = 0x00;
const SOCKS5_METHOD_USERNAME: u8 = 0x02;
const SOCKS5_METHOD_UNACCEPTABLE: u8 = 0xff;
const SOCKS5_CMD_CONNECT: u8 = 0x01;
const MAX_HTTP_HEADER_BYTES: usize = 8192;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserOptions {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MixedInboundOptions {
    pub listen: NetLocation,
    #[serde(default)]
    pub users: Vec<UserOptions>,
}

pub struct MixedInbound {
    tag: String,
    listen: SocketAddr,
    users: Arc<Vec<UserOptions>>,
    http_auth_tokens: Arc<Vec<String>>,
    router: Arc<dyn Router>,
    serve_task: Mutex<Option<JoinHandle<()>>>,
    bound_addr: Mutex<Option<SocketAddr>>,
}

impl MixedInbound {
    pub fn new(
        ctx: &ConstructContext,
        tag: &str,
        options: MixedInboundOptions,
    ) -> std::io::Result<Self> {
        let listen = options.listen.to_socket_addr_nonblocking().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("listen address must be an ip address: {}", options.listen),
            )
        })?;
        let http_auth_tokens = options
            .users
            .iter()
            .map(|u| BASE64.encode(format!("{}:{}", u.username, u.password)))
            .collect();
        Ok(Self {
            tag: tag.to_string(),
            listen,
            users: Arc::new(options.users),
            http_auth_tokens: Arc::new(http_auth_tokens),
            router: ctx.router.clone(),
            serve_task: Mutex::new(None),
            bound_addr: Mutex::new(None),
        })
    }

    /// The address the listener actually bound, once started. Differs from
    /// the configured address when the configured port is 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.bound_addr.lock()
    }
}

#[async_trait]
impl Lifecycle for MixedInbound {
    fn tag(&self) -> &str {
        &self.tag
    }

    async fn start(&self, stage: StartStage) -> std::io::Result<()> {
        if stage != StartStage::Start {
            return Ok(());
        }
        let listener = tokio::net::TcpListener::bind(self.listen).await?;
        let bound = listener.local_addr()?;
        *self.bound_addr.lock() = Some(bound);
        info!("{} listening on {bound}", self.tag);

        let tag = self.tag.clone();
        let users = self.users.clone();
        let tokens = self.http_auth_tokens.clone();
        let router = self.router.clone();
        let task = tokio::spawn(async move {
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("{tag} accept failed: {e}");
                        continue;
                    }
                };
                let users = users.clone();
                let tokens = tokens.clone();
                let router = router.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(stream, &users, &tokens, &router).await {
                        debug!("connection from {peer} ended with error: {e}");
                    }
                });
            }
        });
        *self.serve_task.lock() = Some(task);
        Ok(())
    }

    async fn close(&self) -> std::io::Result<()> {
        if let Some(task) = self.serve_task.lock().take() {
            task.abort();
        }
        Ok(())
    }
}

impl Inbound for MixedInbound {}

async fn serve_connection(
    mut stream: TcpStream,
    users: &[UserOptions],
    http_auth_tokens: &[String],
    router: &Arc<dyn Router>,
) -> std::io::Result<()> {
    let mut first = [0u8; 1];
    let n = stream.peek(&mut first).await?;
    if n == 0 {
        return Ok(());
    }
    if first[0] == VER_SOCKS5 {
        serve_socks5(&mut stream, users, router).await
    } else {
        serve_http(&mut stream, http_auth_tokens, router).await
    }
}

async fn serve_socks5(
    stream: &mut TcpStream,
    users: &[UserOptions],
    router: &Arc<dyn Router>,
) -> std::io::Result<()> {
    let mut greeting = [0u8; 2];
    stream.read_exact(&mut greeting).await?;
    let mut methods = vec![0u8; greeting[1] as usize];
    stream.read_exact(&mut methods).await?;

    let wanted = if users.is_empty() {
        SOCKS5_METHOD_NONE
    } else {
        SOCKS5_METHOD_USERNAME
    };
    if !methods.contains(&wanted) {
        stream
            .write_all(&[VER_SOCKS5, SOCKS5_METHOD_UNACCEPTABLE])
            .await?;
        return Err(std::io::Error::other("no acceptable auth method"));
    }
    stream.write_all(&[VER_SOCKS5, wanted]).await?;

    if wanted == SOCKS5_METHOD_USERNAME {
        // RFC 1929 subnegotiation.
        let mut header = [0u8; 2];
        stream.read_exact(&mut header).await?;
        let mut username = vec![0u8; header[1] as usize];
        stream.read_exact(&mut username).await?;
        let mut password_len = [0u8; 1];
        stream.read_exact(&mut password_len).await?;
        let mut password = vec![0u8; password_len[0] as usize];
        stream.read_exact(&mut password).await?;

        let authorized = users.iter().any(|u| {
            u.username.as_bytes() == username.as_slice()
                && u.password.as_bytes() == password.as_slice()
        });
        if !authorized {
            stream.write_all(&[0x01, 0x01]).await?;
            return Err(std::io::Error::other("socks5 authentication failed"));
        }
        stream.write_all(&[0x01, 0x00]).await?;
    }

    let mut request = [0u8; 4];
    stream.read_exact(&mut request).await?;
    if request[1] != SOCKS5_CMD_CONNECT {
        stream
            .write_all(&[VER_SOCKS5, 0x07, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
            .await?;
        return Err(std::io::Error::other(format!(
            "unsupported socks5 command: {}",
            request[1]
        )));
    }

    let address = match request[3] {
        0x01 => {
            let mut octets = [0u8; 4];
            stream.read_exact(&mut octets).await?;
            Address::Ipv4(octets.into())
        }
        0x03 => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;
            let mut name = vec![0u8; len[0] as usize];
            stream.read_exact(&mut name).await?;
            let name = String::from_utf8(name).map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid hostname bytes")
            })?;
            Address::from(&name)?
        }
        0x04 => {
            let mut octets = [0u8; 16];
            stream.read_exact(&mut octets).await?;
            Address::Ipv6(octets.into())
        }
        other => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid socks5 address type: {other}"),
            ));
        }
    };
    let mut port = [0u8; 2];
    stream.read_exact(&mut port).await?;
    let destination = NetLocation::new(address, u16::from_be_bytes(port));

    let mut remote = match router.route(&destination).await {
        Ok(remote) => remote,
        Err(e) => {
            stream
                .write_all(&[VER_SOCKS5, 0x05, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
                .await?;
            return Err(e);
        }
    };
    stream
        .write_all(&[VER_SOCKS5, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
        .await?;

    tokio::io::copy_bidirectional(stream, &mut remote).await?;
    Ok(())
}

async fn serve_http(
    stream: &mut TcpStream,
    auth_tokens: &[String],
    router: &Arc<dyn Router>,
) -> std::io::Result<()> {
    let header = read_http_header(stream).await?;
    let header_text = String::from_utf8_lossy(&header);
    let mut lines = header_text.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split(' ');
    let (method, target) = (
        parts.next().unwrap_or_default(),
        parts.next().unwrap_or_default(),
    );

    if !method.eq_ignore_ascii_case("CONNECT") {
        stream
            .write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n")
            .await?;
        return Err(std::io::Error::other(format!(
            "unsupported http method: {method}"
        )));
    }

    if !auth_tokens.is_empty() {
        let token = lines
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("proxy-authorization"))
            .and_then(|(_, value)| value.trim().strip_prefix("Basic "))
            .map(str::trim);
        let authorized = matches!(token, Some(t) if auth_tokens.iter().any(|known| known == t));
        if !authorized {
            stream
                .write_all(
                    b"HTTP/1.1 407 Proxy Authentication Required\r\n\
                      Proxy-Authenticate: Basic realm=\"proxy\"\r\n\r\n",
                )
                .await?;
            return Err(std::io::Error::other("http proxy authentication failed"));
        }
    }

    let destination = NetLocation::from_str(target, Some(443))?;
    let mut remote = match router.route(&destination).await {
        Ok(remote) => remote,
        Err(e) => {
            stream.write_all(b"HTTP/1.1 502 Bad Gateway\r\n\r\n").await?;
            return Err(e);
        }
    };
    stream
        .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
        .await?;

    tokio::io::copy_bidirectional(stream, &mut remote).await?;
    Ok(())
}

/// Read bytes until the end of the header block.
async fn read_http_header(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(512);
    let mut byte = [0u8; 1];
    while !header.ends_with(b"\r\n\r\n") {
        if header.len() >= MAX_HTTP_HEADER_BYTES {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "http header too large",
            ));
        }
        stream.read_exact(&mut byte).await?;
        header.push(byte[0]);
    }
    Ok(header)
}

pub fn register_inbound(registry: &mut RegistryBuilder<dyn Inbound>) {
    registry
        .register::<MixedInboundOptions, _>(constant::TYPE_MIXED, |ctx, tag, options| {
            Ok(Box::new(MixedInbound::new(ctx, tag, options)?))
        })
        .expect("registration conflict");
}
