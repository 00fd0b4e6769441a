//! Component type tags.
//!
//! Every tag the unified configuration schema can name is listed here, even
//! the ones no build profile implements anymore. Profile assembly registers
//! each tag exactly once per kind, either with a real constructor or a stub.

pub const TYPE_TUN: &str = "tun";
pub const TYPE_MIXED: &str = "mixed";
pub const TYPE_SOCKS: &str = "socks";
pub const TYPE_HTTP: &str = "http";
pub const TYPE_DIRECT: &str = "direct";
pub const TYPE_BLOCK: &str = "block";
pub const TYPE_DNS: &str = "dns";
pub const TYPE_SELECTOR: &str = "selector";
pub const TYPE_URLTEST: &str = "urltest";
pub const TYPE_SHADOWSOCKS: &str = "shadowsocks";
pub const TYPE_SHADOWSOCKSR: &str = "shadowsocksr";
pub const TYPE_VMESS: &str = "vmess";
pub const TYPE_VLESS: &str = "vless";
pub const TYPE_TROJAN: &str = "trojan";
pub const TYPE_REDIRECT: &str = "redirect";
pub const TYPE_TPROXY: &str = "tproxy";
pub const TYPE_SSH: &str = "ssh";
pub const TYPE_TOR: &str = "tor";

pub const TYPE_AWG: &str = "awg";
pub const TYPE_WIREGUARD: &str = "wireguard";
pub const TYPE_TAILSCALE: &str = "tailscale";

pub const DNS_TYPE_UDP: &str = "udp";
pub const DNS_TYPE_TCP: &str = "tcp";
pub const DNS_TYPE_TLS: &str = "tls";
pub const DNS_TYPE_HTTPS: &str = "https";
pub const DNS_TYPE_HOSTS: &str = "hosts";
pub const DNS_TYPE_LOCAL: &str = "local";
pub const DNS_TYPE_FAKEIP: &str = "fakeip";
pub const DNS_TYPE_RESOLVED: &str = "resolved";

pub const SERVICE_TYPE_RESOLVED: &str = "resolved";

/// All inbound tags the configuration schema accepts.
pub const INBOUND_UNIVERSE: &[&str] = &[
    TYPE_TUN,
    TYPE_MIXED,
    TYPE_SOCKS,
    TYPE_HTTP,
    TYPE_DIRECT,
    TYPE_SHADOWSOCKS,
    TYPE_SHADOWSOCKSR,
    TYPE_VMESS,
    TYPE_VLESS,
    TYPE_TROJAN,
    TYPE_REDIRECT,
    TYPE_TPROXY,
];

/// All outbound tags the configuration schema accepts.
pub const OUTBOUND_UNIVERSE: &[&str] = &[
    TYPE_DIRECT,
    TYPE_BLOCK,
    TYPE_DNS,
    TYPE_SELECTOR,
    TYPE_URLTEST,
    TYPE_SOCKS,
    TYPE_HTTP,
    TYPE_SHADOWSOCKS,
    TYPE_SHADOWSOCKSR,
    TYPE_VMESS,
    TYPE_VLESS,
    TYPE_TROJAN,
    TYPE_SSH,
    TYPE_TOR,
];

pub const ENDPOINT_UNIVERSE: &[&str] = &[TYPE_AWG, TYPE_WIREGUARD, TYPE_TAILSCALE];

pub const DNS_TRANSPORT_UNIVERSE: &[&str] = &[
    DNS_TYPE_UDP,
    DNS_TYPE_TCP,
    DNS_TYPE_TLS,
    DNS_TYPE_HTTPS,
    DNS_TYPE_HOSTS,
    DNS_TYPE_LOCAL,
    DNS_TYPE_FAKEIP,
    DNS_TYPE_RESOLVED,
];

pub const SERVICE_UNIVERSE: &[&str] = &[SERVICE_TYPE_RESOLVED];
