use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use crate::adapter::{AsyncStream, Network, StartStage};
use crate::address::{IpSubnet, NetLocation};
use crate::dialer::Dialer;
use crate::obfs::new_obfuscator;

use super::bind::ObfuscatedBind;
use super::netstack::NetworkTun;

#[derive(Debug, Clone)]
pub struct DeviceOptions {
    pub addresses: Vec<IpSubnet>,
    pub allowed_subnets: Vec<IpSubnet>,
    pub excluded_subnets: Vec<IpSubnet>,
    pub mtu: u32,
    pub obfuscation: Option<String>,
}

/// The network interface a tunnel device exposes to callers.
#[async_trait]
pub trait VirtualInterface: Send + Sync {
    fn start(&self) -> std::io::Result<()>;

    async fn dial_context(
        &self,
        network: Network,
        destination: &NetLocation,
    ) -> std::io::Result<Box<dyn AsyncStream>>;

    async fn listen_packet(&self, destination: &NetLocation) -> std::io::Result<UdpSocket>;
}

/// The tunnel protocol engine. Configured over its native line-oriented
/// `key=value` IPC format; owns the transport bind and interface handles it
/// was attached to, and releases them on `down()`.
pub trait TunnelEngine: Send + Sync {
    fn ipc_set(&self, config: &str) -> std::io::Result<()>;

    fn down(&self) -> std::io::Result<()>;
}

/// One tunnel engine instance bound to one virtual interface and one
/// obfuscated transport bind.
pub struct TunnelDevice {
    engine: Box<dyn TunnelEngine>,
    tun: Arc<dyn VirtualInterface>,
}

impl TunnelDevice {
    /// Build the interface, then the transport bind, then the engine.
    /// An interface failure aborts before any other state exists.
    pub fn new<F>(
        options: &DeviceOptions,
        dialer: &Arc<dyn Dialer>,
        engine: F,
    ) -> std::io::Result<Self>
    where
        F: FnOnce(Arc<dyn VirtualInterface>, ObfuscatedBind) -> std::io::Result<Box<dyn TunnelEngine>>,
    {
        let tun = NetworkTun::new(&options.addresses, options.mtu)?;
        Self::with_interface(Arc::new(tun), options, dialer, engine)
    }

    pub fn with_interface<F>(
        tun: Arc<dyn VirtualInterface>,
        options: &DeviceOptions,
        dialer: &Arc<dyn Dialer>,
        engine: F,
    ) -> std::io::Result<Self>
    where
        F: FnOnce(Arc<dyn VirtualInterface>, ObfuscatedBind) -> std::io::Result<Box<dyn TunnelEngine>>,
    {
        let obfuscator = match options.obfuscation {
            Some(ref tag) => Some(new_obfuscator(tag)?),
            None => None,
        };
        let bind = ObfuscatedBind::new(dialer.bind_udp()?, obfuscator);
        let engine = engine(tun.clone(), bind)?;
        Ok(Self { engine, tun })
    }

    /// Staged lifecycle hook. Only `Start` brings the interface up; the
    /// surrounding runtime delivers the other stages and they are no-ops
    /// here.
    pub fn start(&self, stage: StartStage) -> std::io::Result<()> {
        if stage != StartStage::Start {
            return Ok(());
        }
        self.tun.start()
    }

    /// Tear the engine down, releasing the bind and interface with it.
    /// Call at most once.
    pub fn close(&self) -> std::io::Result<()> {
        self.engine.down()
    }

    /// Forward a configuration update to the engine verbatim.
    pub fn set_ipc_config(&self, config: &str) -> std::io::Result<()> {
        self.engine.ipc_set(config)
    }

    pub async fn dial(
        &self,
        network: Network,
        destination: &NetLocation,
    ) -> std::io::Result<Box<dyn AsyncStream>> {
        self.tun.dial_context(network, destination).await
    }

    pub async fn listen_packet(&self, destination: &NetLocation) -> std::io::Result<UdpSocket> {
        self.tun.listen_packet(destination).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::dialer::DirectDialer;

    struct MockInterface {
        started: AtomicUsize,
    }

    #[async_trait]
    impl VirtualInterface for MockInterface {
        fn start(&self) -> std::io::Result<()> {
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn dial_context(
            &self,
            _network: Network,
            _destination: &NetLocation,
        ) -> std::io::Result<Box<dyn AsyncStream>> {
            Err(std::io::Error::other("mock"))
        }

        async fn listen_packet(&self, _destination: &NetLocation) -> std::io::Result<UdpSocket> {
            Err(std::io::Error::other("mock"))
        }
    }

    struct MockEngine {
        down: AtomicBool,
        configs: Mutex<Vec<String>>,
    }

    impl TunnelEngine for Arc<MockEngine> {
        fn ipc_set(&self, config: &str) -> std::io::Result<()> {
            self.configs.lock().push(config.to_string());
            Ok(())
        }

        fn down(&self) -> std::io::Result<()> {
            self.down.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn options() -> DeviceOptions {
        DeviceOptions {
            addresses: vec![IpSubnet::from_str("10.8.0.2/32").unwrap()],
            allowed_subnets: vec![],
            excluded_subnets: vec![],
            mtu: 1408,
            obfuscation: Some("counter".to_string()),
        }
    }

    fn mock_device() -> (TunnelDevice, Arc<MockInterface>, Arc<MockEngine>) {
        let tun = Arc::new(MockInterface {
            started: AtomicUsize::new(0),
        });
        let engine = Arc::new(MockEngine {
            down: AtomicBool::new(false),
            configs: Mutex::new(vec![]),
        });
        let dialer: Arc<dyn Dialer> = Arc::new(DirectDialer::default());
        let engine_handle = engine.clone();
        let device = TunnelDevice::with_interface(tun.clone(), &options(), &dialer, move |_t, _b| {
            Ok(Box::new(engine_handle) as Box<dyn TunnelEngine>)
        })
        .unwrap();
        (device, tun, engine)
    }

    #[tokio::test]
    async fn test_only_start_stage_starts_interface() {
        let (device, tun, _engine) = mock_device();

        device.start(StartStage::Initialize).unwrap();
        device.start(StartStage::PostStart).unwrap();
        device.start(StartStage::Started).unwrap();
        assert_eq!(tun.started.load(Ordering::SeqCst), 0);

        device.start(StartStage::Start).unwrap();
        assert_eq!(tun.started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_tears_down_engine() {
        let (device, _tun, engine) = mock_device();
        assert!(!engine.down.load(Ordering::SeqCst));
        device.close().unwrap();
        assert!(engine.down.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_ipc_config_forwarded_verbatim() {
        let (device, _tun, engine) = mock_device();
        let config = "private_key=0011\npublic_key=2233\nendpoint=1.2.3.4:51820\n";
        device.set_ipc_config(config).unwrap();
        assert_eq!(engine.configs.lock().as_slice(), &[config.to_string()]);
    }

    #[tokio::test]
    async fn test_interface_failure_propagates_unchanged() {
        let dialer: Arc<dyn Dialer> = Arc::new(DirectDialer::default());
        let mut bad = options();
        bad.addresses.clear();
        let err = TunnelDevice::new(&bad, &dialer, |_t, _b| {
            panic!("engine must not be built when the interface fails")
        })
        .err()
        .unwrap();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_unknown_obfuscation_tag_fails_construction() {
        let dialer: Arc<dyn Dialer> = Arc::new(DirectDialer::default());
        let mut bad = options();
        bad.obfuscation = Some("rot13".to_string());
        let err = TunnelDevice::new(&bad, &dialer, |_t, _b| {
            panic!("engine must not be built when the transform is unknown")
        })
        .err()
        .unwrap();
        assert!(err.to_string().contains("unknown obfuscation transform"));
    }
}
