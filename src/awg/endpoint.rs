use async_trait::async_trait;
use log::info;
use serde::Deserialize;
use tokio::net::UdpSocket;

use crate::adapter::{
    AsyncStream, ConstructContext, Endpoint, Lifecycle, Network, StartStage,
};
use crate::address::{IpSubnet, NetLocation};
use crate::constant;
use crate::registry::RegistryBuilder;

use super::device::{DeviceOptions, TunnelDevice, TunnelEngine};
use super::engine::AwgEngine;

fn default_mtu() -> u32 {
    1408
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwgPeerOptions {
    pub public_key: String,
    #[serde(default)]
    pub preshared_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<NetLocation>,
    #[serde(default)]
    pub allowed_ips: Vec<IpSubnet>,
    #[serde(default)]
    pub persistent_keepalive: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwgEndpointOptions {
    #[serde(alias = "address")]
    pub addresses: Vec<IpSubnet>,
    #[serde(default)]
    pub allowed_subnets: Vec<IpSubnet>,
    #[serde(default)]
    pub excluded_subnets: Vec<IpSubnet>,
    #[serde(default = "default_mtu")]
    pub mtu: u32,
    #[serde(default)]
    pub obfuscation: Option<String>,
    pub private_key: String,
    #[serde(default)]
    pub listen_port: Option<u16>,
    #[serde(default)]
    pub peers: Vec<AwgPeerOptions>,
}

/// Tunnel endpoint component. Owns one [`TunnelDevice`]; peers from the
/// options are rendered into the engine's IPC format and applied when the
/// interface comes up.
pub struct AwgEndpoint {
    tag: String,
    device: TunnelDevice,
    ipc_config: String,
}

impl AwgEndpoint {
    pub fn new(
        ctx: &ConstructContext,
        tag: &str,
        options: AwgEndpointOptions,
    ) -> std::io::Result<Self> {
        let device_options = DeviceOptions {
            addresses: options.addresses.clone(),
            allowed_subnets: options.allowed_subnets.clone(),
            excluded_subnets: options.excluded_subnets.clone(),
            mtu: options.mtu,
            obfuscation: options.obfuscation.clone(),
        };
        let device = TunnelDevice::new(&device_options, &ctx.dialer, |tun, bind| {
            Ok(Box::new(AwgEngine::attach(tun, bind)) as Box<dyn TunnelEngine>)
        })?;
        let ipc_config = render_ipc_config(&options);
        Ok(Self {
            tag: tag.to_string(),
            device,
            ipc_config,
        })
    }
}

fn render_ipc_config(options: &AwgEndpointOptions) -> String {
    let mut lines = vec![format!("private_key={}", options.private_key)];
    if let Some(port) = options.listen_port {
        lines.push(format!("listen_port={port}"));
    }
    lines.push("replace_peers=true".to_string());
    for peer in &options.peers {
        lines.push(format!("public_key={}", peer.public_key));
        if let Some(ref psk) = peer.preshared_key {
            lines.push(format!("preshared_key={psk}"));
        }
        if let Some(ref endpoint) = peer.endpoint {
            lines.push(format!("endpoint={endpoint}"));
        }
        for allowed in &peer.allowed_ips {
            lines.push(format!("allowed_ip={allowed}"));
        }
        if let Some(keepalive) = peer.persistent_keepalive {
            lines.push(format!("persistent_keepalive_interval={keepalive}"));
        }
    }
    lines.push(String::new());
    lines.join("\n")
}

#[async_trait]
impl Lifecycle for AwgEndpoint {
    fn tag(&self) -> &str {
        &self.tag
    }

    async fn start(&self, stage: StartStage) -> std::io::Result<()> {
        self.device.start(stage)?;
        if stage == StartStage::Start {
            self.device.set_ipc_config(&self.ipc_config)?;
            info!("awg endpoint {} is up", self.tag);
        }
        Ok(())
    }

    async fn close(&self) -> std::io::Result<()> {
        self.device.close()
    }
}

#[async_trait]
impl Endpoint for AwgEndpoint {
    async fn dial(
        &self,
        network: Network,
        destination: &NetLocation,
    ) -> std::io::Result<Box<dyn AsyncStream>> {
        self.device.dial(network, destination).await
    }

    async fn listen_packet(&self, destination: &NetLocation) -> std::io::Result<UdpSocket> {
        self.device.listen_packet(destination).await
    }
}

pub fn register_endpoint(registry: &mut RegistryBuilder<dyn Endpoint>) {
    registry
        .register::<AwgEndpointOptions, _>(constant::TYPE_AWG, |ctx, tag, options| {
            Ok(Box::new(AwgEndpoint::new(ctx, tag, options)?))
        })
        .expect("registration conflict");
}
