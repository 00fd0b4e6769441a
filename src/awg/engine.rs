use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use super::bind::ObfuscatedBind;
use super::device::{TunnelEngine, VirtualInterface};

struct EngineState {
    #[allow(dead_code)]
    tun: Arc<dyn VirtualInterface>,
    #[allow(dead_code)]
    bind: ObfuscatedBind,
    config: Vec<String>,
}

/// Tunnel engine attached to one interface and one transport bind.
///
/// Accepts configuration over the usual line-oriented `key=value` format
/// (private key, peers, endpoints, allowed IPs). `down()` releases the bind
/// and interface handles; a downed engine rejects everything.
pub struct AwgEngine {
    state: Mutex<Option<EngineState>>,
}

impl AwgEngine {
    pub fn attach(tun: Arc<dyn VirtualInterface>, bind: ObfuscatedBind) -> Self {
        Self {
            state: Mutex::new(Some(EngineState {
                tun,
                bind,
                config: vec![],
            })),
        }
    }

    #[cfg(test)]
    pub fn config_lines(&self) -> Vec<String> {
        self.state
            .lock()
            .as_ref()
            .map(|s| s.config.clone())
            .unwrap_or_default()
    }
}

impl TunnelEngine for AwgEngine {
    fn ipc_set(&self, config: &str) -> std::io::Result<()> {
        let mut staged = Vec::new();
        for line in config.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if !line.contains('=') {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("invalid ipc line: {line}"),
                ));
            }
            staged.push(line.to_string());
        }

        let mut state = self.state.lock();
        let Some(state) = state.as_mut() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "tunnel engine is down",
            ));
        };
        debug!("tunnel engine applying {} config lines", staged.len());
        state.config = staged;
        Ok(())
    }

    fn down(&self) -> std::io::Result<()> {
        match self.state.lock().take() {
            Some(_released) => Ok(()),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "tunnel engine is already down",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::IpSubnet;
    use crate::awg::NetworkTun;
    use crate::dialer::new_udp_socket;

    fn new_engine() -> AwgEngine {
        let tun = Arc::new(
            NetworkTun::new(&[IpSubnet::from_str("10.8.0.2/32").unwrap()], 1408).unwrap(),
        );
        let bind = ObfuscatedBind::new(new_udp_socket(None).unwrap(), None);
        AwgEngine::attach(tun, bind)
    }

    #[tokio::test]
    async fn test_ipc_set_replaces_config() {
        let engine = new_engine();
        engine.ipc_set("private_key=aa\n\npublic_key=bb\n").unwrap();
        assert_eq!(engine.config_lines(), ["private_key=aa", "public_key=bb"]);

        engine.ipc_set("private_key=cc\n").unwrap();
        assert_eq!(engine.config_lines(), ["private_key=cc"]);
    }

    #[tokio::test]
    async fn test_ipc_set_rejects_malformed_lines() {
        let engine = new_engine();
        let err = engine.ipc_set("private_key=aa\nnot a pair\n").unwrap_err();
        assert!(err.to_string().contains("invalid ipc line"));
        // Nothing from the rejected update is retained.
        assert!(engine.config_lines().is_empty());
    }

    #[tokio::test]
    async fn test_down_releases_and_rejects_reuse() {
        let engine = new_engine();
        engine.down().unwrap();
        assert!(engine.down().is_err());
        assert!(engine.ipc_set("k=v").is_err());
    }
}
