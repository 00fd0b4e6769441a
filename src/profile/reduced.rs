//! Reduced profile for router deployments: tun and mixed inbounds, VLESS as
//! the only proxy outbound, the AWG endpoint, UDP-only DNS. No groups, no
//! background services.

use crate::adapter::{DnsTransport, Endpoint, Inbound, Outbound, Service};
use crate::awg;
use crate::constant as C;
use crate::dns;
use crate::dns::{FakeIpOptions, HickoryDnsOptions, HostsOptions, LocalDnsOptions};
use crate::protocol::group::{SelectorOutboundOptions, UrlTestOutboundOptions};
use crate::protocol::{block, direct, dns as dns_outbound, mixed, tun, vless};
use crate::registry::{ComponentKind, Registry, RegistryBuilder};
use crate::service::ResolvedServiceOptions;
use crate::stub::{IgnoredOptions, Stub};

pub const NAME: &str = "reduced";

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
    vless::register_outbound(&mut registry);

    register_outbound_stubs(&mut registry);

    registry.build()
}

pub fn endpoint_registry() -> Registry<dyn Endpoint> {
    let mut registry = RegistryBuilder::new(ComponentKind::Endpoint);

    awg::register_endpoint(&mut registry);

    registry
        .register_stub::<IgnoredOptions>(C::TYPE_WIREGUARD, Stub::excluded("WireGuard").suggest("awg"))
        .expect("registration conflict");
    registry
        .register_stub::<IgnoredOptions>(C::TYPE_TAILSCALE, Stub::excluded("Tailscale"))
        .expect("registration conflict");

    registry.build()
}

pub fn dns_transport_registry() -> Registry<dyn DnsTransport> {
    let mut registry = RegistryBuilder::new(ComponentKind::DnsTransport);

    dns::register_udp(&mut registry);

    registry
        .register_stub::<HickoryDnsOptions>(C::DNS_TYPE_TCP, Stub::excluded("tcp dns").suggest("udp"))
        .expect("registration conflict");
    registry
        .register_stub::<HickoryDnsOptions>(C::DNS_TYPE_TLS, Stub::excluded("tls dns").suggest("udp"))
        .expect("registration conflict");
    registry
        .register_stub::<HickoryDnsOptions>(C::DNS_TYPE_HTTPS, Stub::excluded("https dns").suggest("udp"))
        .expect("registration conflict");
    registry
        .register_stub::<HostsOptions>(C::DNS_TYPE_HOSTS, Stub::excluded("hosts dns"))
        .expect("registration conflict");
    registry
        .register_stub::<LocalDnsOptions>(C::DNS_TYPE_LOCAL, Stub::excluded("local dns"))
        .expect("registration conflict");
    registry
        .register_stub::<FakeIpOptions>(C::DNS_TYPE_FAKEIP, Stub::excluded("fakeip"))
        .expect("registration conflict");
    registry
        .register_stub::<LocalDnsOptions>(C::DNS_TYPE_RESOLVED, Stub::excluded("resolved dns"))
        .expect("registration conflict");

    registry.build()
}

pub fn service_registry() -> Registry<dyn Service> {
    let mut registry = RegistryBuilder::new(ComponentKind::Service);

    registry
        .register_stub::<ResolvedServiceOptions>(
            C::SERVICE_TYPE_RESOLVED,
            Stub::excluded("resolved service"),
        )
        .expect("registration conflict");

    registry.build()
}

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
        .register_stub::<SelectorOutboundOptions>(C::TYPE_SELECTOR, Stub::excluded("selector"))
        .expect("registration conflict");
    registry
        .register_stub::<UrlTestOutboundOptions>(C::TYPE_URLTEST, Stub::excluded("urltest"))
        .expect("registration conflict");
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
