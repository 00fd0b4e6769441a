//! DNS resolution transports.
//!
//! Each transport is a configurable component resolving hostnames one way:
//! classic UDP/TCP/DoT/DoH servers (hickory-dns), a static hosts map, the
//! system resolver, or a fake-ip allocator for tun-style routing.

mod hickory;
mod simple;

pub use hickory::{HickoryDnsOptions, HickoryTransport};
pub use simple::{
    FakeIpOptions, FakeIpTransport, HostsOptions, HostsTransport, LocalDnsOptions,
    LocalTransport,
};

use crate::adapter::DnsTransport;
use crate::constant;
use crate::registry::RegistryBuilder;

pub fn register_udp(registry: &mut RegistryBuilder<dyn DnsTransport>) {
    registry
        .register::<HickoryDnsOptions, _>(constant::DNS_TYPE_UDP, |_ctx, tag, options| {
            Ok(Box::new(HickoryTransport::udp(tag, options)?))
        })
        .expect("registration conflict");
}

pub fn register_tcp(registry: &mut RegistryBuilder<dyn DnsTransport>) {
    registry
        .register::<HickoryDnsOptions, _>(constant::DNS_TYPE_TCP, |_ctx, tag, options| {
            Ok(Box::new(HickoryTransport::tcp(tag, options)?))
        })
        .expect("registration conflict");
}

pub fn register_tls(registry: &mut RegistryBuilder<dyn DnsTransport>) {
    registry
        .register::<HickoryDnsOptions, _>(constant::DNS_TYPE_TLS, |_ctx, tag, options| {
            Ok(Box::new(HickoryTransport::tls(tag, options)?))
        })
        .expect("registration conflict");
}

pub fn register_https(registry: &mut RegistryBuilder<dyn DnsTransport>) {
    registry
        .register::<HickoryDnsOptions, _>(constant::DNS_TYPE_HTTPS, |_ctx, tag, options| {
            Ok(Box::new(HickoryTransport::https(tag, options)?))
        })
        .expect("registration conflict");
}

pub fn register_hosts(registry: &mut RegistryBuilder<dyn DnsTransport>) {
    registry
        .register::<HostsOptions, _>(constant::DNS_TYPE_HOSTS, |_ctx, tag, options| {
            Ok(Box::new(HostsTransport::new(tag, options)))
        })
        .expect("registration conflict");
}

pub fn register_local(registry: &mut RegistryBuilder<dyn DnsTransport>) {
    registry
        .register::<LocalDnsOptions, _>(constant::DNS_TYPE_LOCAL, |_ctx, tag, _options| {
            Ok(Box::new(LocalTransport::new(tag)))
        })
        .expect("registration conflict");
}

pub fn register_fakeip(registry: &mut RegistryBuilder<dyn DnsTransport>) {
    registry
        .register::<FakeIpOptions, _>(constant::DNS_TYPE_FAKEIP, |_ctx, tag, options| {
            Ok(Box::new(FakeIpTransport::new(tag, options)?))
        })
        .expect("registration conflict");
}

pub fn register_resolved(registry: &mut RegistryBuilder<dyn DnsTransport>) {
    registry
        .register::<LocalDnsOptions, _>(constant::DNS_TYPE_RESOLVED, |_ctx, tag, _options| {
            // The resolved transport asks the local stub resolver, which on
            // systemd machines is backed by systemd-resolved.
            Ok(Box::new(LocalTransport::new(tag)))
        })
        .expect("registration conflict");
}
