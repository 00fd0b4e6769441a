//! AWG tunnel endpoint: a tunnel engine composed with a virtual network
//! interface and an obfuscating UDP transport bind.

mod bind;
mod device;
mod endpoint;
mod engine;
mod netstack;

pub use bind::ObfuscatedBind;
pub use device::{DeviceOptions, TunnelDevice, TunnelEngine, VirtualInterface};
pub use endpoint::{AwgEndpointOptions, AwgPeerOptions, register_endpoint};
pub use engine::AwgEngine;
pub use netstack::NetworkTun;
