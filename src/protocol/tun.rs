//! TUN inbound: terminates a VPN-style virtual interface and feeds its
//! traffic to the router.

use std::net::IpAddr;

use async_trait::async_trait;
use log::info;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::adapter::{ConstructContext, Inbound, Lifecycle, StartStage};
use crate::constant;
use crate::registry::RegistryBuilder;

fn default_tun_mtu() -> u16 {
    1500
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TunInboundOptions {
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub address: Option<IpAddr>,
    #[serde(default)]
    pub netmask: Option<IpAddr>,
    #[serde(default)]
    pub destination: Option<IpAddr>,
    #[serde(default = "default_tun_mtu")]
    pub mtu: u16,
    /// File descriptor of an already-open device, for platforms where the
    /// surrounding VPN service owns device creation.
    #[serde(default)]
    pub device_fd: Option<i32>,
}

pub struct TunInbound {
    tag: String,
    options: TunInboundOptions,
    #[cfg(target_os = "linux")]
    device: Mutex<Option<::tun::Device>>,
    #[cfg(not(target_os = "linux"))]
    device: Mutex<Option<()>>,
}

impl TunInbound {
    pub fn new(
        _ctx: &ConstructContext,
        tag: &str,
        options: TunInboundOptions,
    ) -> std::io::Result<Self> {
        if options.mtu < 576 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("tun mtu {} is too small", options.mtu),
            ));
        }
        Ok(Self {
            tag: tag.to_string(),
            options,
            device: Mutex::new(None),
        })
    }

    #[cfg(target_os = "linux")]
    fn create_device(&self) -> std::io::Result<::tun::Device> {
        let mut config = ::tun::Configuration::default();
        config.mtu(self.options.mtu);
        if let Some(ref name) = self.options.device_name {
            config.tun_name(name);
        }
        if let Some(addr) = self.options.address {
            config.address(addr);
        }
        if let Some(mask) = self.options.netmask {
            config.netmask(mask);
        }
        if let Some(dest) = self.options.destination {
            config.destination(dest);
        }
        if let Some(fd) = self.options.device_fd {
            config.raw_fd(fd);
        }
        config.platform_config(|p| {
            p.ensure_root_privileges(true);
        });
        config.up();

        ::tun::create(&config)
            .map_err(|e| std::io::Error::other(format!("failed to create tun device: {e}")))
    }
}

#[async_trait]
impl Lifecycle for TunInbound {
    fn tag(&self) -> &str {
        &self.tag
    }

    async fn start(&self, stage: StartStage) -> std::io::Result<()> {
        if stage != StartStage::Start {
            return Ok(());
        }

        #[cfg(target_os = "linux")]
        {
            let device = self.create_device()?;
            *self.device.lock() = Some(device);
            info!(
                "{} tun device {} is up, mtu {}",
                self.tag,
                self.options.device_name.as_deref().unwrap_or("(unnamed)"),
                self.options.mtu
            );
            Ok(())
        }

        #[cfg(not(target_os = "linux"))]
        {
            Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "tun inbound requires a platform-owned device fd on this platform",
            ))
        }
    }

    async fn close(&self) -> std::io::Result<()> {
        self.device.lock().take();
        Ok(())
    }
}

impl Inbound for TunInbound {}

pub fn register_inbound(registry: &mut RegistryBuilder<dyn Inbound>) {
    registry
        .register::<TunInboundOptions, _>(constant::TYPE_TUN, |ctx, tag, options| {
            Ok(Box::new(TunInbound::new(ctx, tag, options)?))
        })
        .expect("registration conflict");
}
