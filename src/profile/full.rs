//! Full profile: every protocol family this distribution carries.

use crate::adapter::{DnsTransport, Endpoint, Inbound, Outbound, Service};
use crate::awg;
use crate::constant as C;
use crate::dns;
use crate::protocol::{block, direct, dns as dns_outbound, group, mixed, tun, vless};
use crate::registry::{ComponentKind, Registry, RegistryBuilder};
use crate::service;
use crate::stub::{IgnoredOptions, Stub};

pub const NAME: &str = "full";

pub fn inbound_registry() -> Registry<dyn Inbound> {
    let mut registry = RegistryBuilder::new(ComponentKind::Inbound);

    tun::register_inbound(&mut registry);
    mixed::register_inbound(&mut registry);

    register_inbound_stubs(&mut registry);

    registry.build()
}

pub fn outbound_registry() -> Registry<dyn Outbound> {
    let mut registry = RegistryBuilder::new(ComponentKind::Outbound);

    direct::register_outbound(&mut registry);
    block::register_outbound(&mut registry);
    dns_outbound::register_outbound(&mut registry);

    // Groups for server selection.
    group::register_selector(&mut registry);
    group::register_urltest(&mut registry);

    vless::register_outbound(&mut registry);

    register_outbound_stubs(&mut registry);

    registry.build()
}

pub fn endpoint_registry() -> Registry<dyn Endpoint> {
    let mut registry = RegistryBuilder::new(ComponentKind::Endpoint);

    awg::register_endpoint(&mut registry);

    register_endpoint_stubs(&mut registry);

    registry.build()
}

pub fn dns_transport_registry() -> Registry<dyn DnsTransport> {
    let mut registry = RegistryBuilder::new(ComponentKind::DnsTransport);

    dns::register_udp(&mut registry);
    dns::register_tcp(&mut registry);
    dns::register_tls(&mut registry);
    dns::register_https(&mut registry);
    dns::register_hosts(&mut registry);
    dns::register_local(&mut registry);
    dns::register_fakeip(&mut registry);
    dns::register_resolved(&mut registry);

    registry.build()
}

pub fn service_registry() -> Registry<dyn Service> {
    let mut registry = RegistryBuilder::new(ComponentKind::Service);

    service::register_resolved(&mut registry);

    registry.build()
}

// Stubs for protocols the distribution does not carry in any profile; the
// tags stay resolvable so full-system configs fail with a clear message.
fn register_inbound_stubs(registry: &mut RegistryBuilder<dyn Inbound>) {
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_SOCKS, Stub::excluded("socks inbound").suggest("mixed"))
        .expect("registration conflict");
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_HTTP, Stub::excluded("http inbound").suggest("mixed"))
        .expect("registration conflict");
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_DIRECT, Stub::excluded("direct inbound"))
        .expect("registration conflict");
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_SHADOWSOCKS, Stub::excluded("shadowsocks"))
        .expect("registration conflict");
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_VMESS, Stub::excluded("vmess"))
        .expect("registration conflict");
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_TROJAN, Stub::excluded("trojan"))
        .expect("registration conflict");
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_VLESS, Stub::excluded("vless inbound"))
        .expect("registration conflict");
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_REDIRECT, Stub::excluded("redirect"))
        .expect("registration conflict");
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_TPROXY, Stub::excluded("tproxy"))
        .expect("registration conflict");
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_SHADOWSOCKSR, Stub::deprecated("ShadowsocksR"))
        .expect("registration conflict");
}

fn register_outbound_stubs(registry: &mut RegistryBuilder<dyn Outbound>) {
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_SOCKS, Stub::excluded("socks outbound"))
        .expect("registration conflict");
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_HTTP, Stub::excluded("http outbound"))
        .expect("registration conflict");
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_SHADOWSOCKS, Stub::excluded("shadowsocks"))
        .expect("registration conflict");
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_VMESS, Stub::excluded("vmess"))
        .expect("registration conflict");
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_TROJAN, Stub::excluded("trojan"))
        .expect("registration conflict");
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_SSH, Stub::excluded("ssh"))
        .expect("registration conflict");
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_TOR, Stub::excluded("tor"))
        .expect("registration conflict");
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_SHADOWSOCKSR, Stub::deprecated("ShadowsocksR"))
        .expect("registration conflict");
}

fn register_endpoint_stubs(registry: &mut RegistryBuilder<dyn Endpoint>) {
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_WIREGUARD, Stub::excluded("WireGuard").suggest("awg"))
        .expect("registration conflict");
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_TAILSCALE, Stub::excluded("Tailscale"))
        .expect("registration conflict");
}
