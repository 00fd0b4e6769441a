//! Build profile assembly.
//!
//! Exactly one profile is compiled into an artifact, selected by cargo
//! feature. A profile decides which type tags get real constructors; every
//! other tag in the schema universe is registered as a stub so reduced
//! builds still resolve full-system configs and fail with a targeted
//! diagnostic. Assembly runs once at startup, before any network activity,
//! and the resulting registries are sealed.

#[cfg(not(any(feature = "full", feature = "reduced", feature = "ultra-reduced")))]
compile_error!(
    "one build profile feature must be enabled: \"full\", \"reduced\" or \"ultra-reduced\""
);

#[cfg(any(
    all(feature = "full", feature = "reduced"),
    all(feature = "full", feature = "ultra-reduced"),
    all(feature = "reduced", feature = "ultra-reduced"),
))]
compile_error!(
    "build profile features are mutually exclusive; enable only one of \"full\", \"reduced\", \"ultra-reduced\" (use default-features = false)"
);

#[cfg(feature = "full")]
mod full;
#[cfg(feature = "full")]
pub use full::{
    NAME, dns_transport_registry, endpoint_registry, inbound_registry, outbound_registry,
    service_registry,
};

#[cfg(all(feature = "reduced", not(feature = "full")))]
mod reduced;
#[cfg(all(feature = "reduced", not(feature = "full")))]
pub use reduced::{
    NAME, dns_transport_registry, endpoint_registry, inbound_registry, outbound_registry,
    service_registry,
};

#[cfg(all(feature = "ultra-reduced", not(any(feature = "full", feature = "reduced"))))]
mod ultra_reduced;
#[cfg(all(feature = "ultra-reduced", not(any(feature = "full", feature = "reduced"))))]
pub use ultra_reduced::{
    NAME, dns_transport_registry, endpoint_registry, inbound_registry, outbound_registry,
    service_registry,
};

use crate::adapter::{DnsTransport, Endpoint, Inbound, Outbound, Service};
use crate::registry::Registry;

/// The five sealed registries of the compiled profile.
pub struct RuntimeRegistries {
    pub inbound: Registry<dyn Inbound>,
    pub outbound: Registry<dyn Outbound>,
    pub endpoint: Registry<dyn Endpoint>,
    pub dns_transport: Registry<dyn DnsTransport>,
    pub service: Registry<dyn Service>,
}

/// Assemble all registries for the compiled profile. Called once at
/// startup.
pub fn runtime_registries() -> RuntimeRegistries {
    RuntimeRegistries {
        inbound: inbound_registry(),
        outbound: outbound_registry(),
        endpoint: endpoint_registry(),
        dns_transport: dns_transport_registry(),
        service: service_registry(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant;
    use crate::registry::ConstructError;
    use crate::test_util::null_ctx;

    fn assert_universe<C: ?Sized>(registry: &Registry<C>, universe: &[&str]) {
        let mut registered: Vec<&str> = registry.type_tags().collect();
        registered.sort_unstable();
        let mut expected: Vec<&str> = universe.to_vec();
        expected.sort_unstable();
        assert_eq!(registered, expected, "{} universe mismatch", registry.kind());
    }

    /// Every profile registers the complete tag universe for every kind.
    #[test]
    fn test_every_known_tag_resolves() {
        let registries = runtime_registries();
        assert_universe(&registries.inbound, constant::INBOUND_UNIVERSE);
        assert_universe(&registries.outbound, constant::OUTBOUND_UNIVERSE);
        assert_universe(&registries.endpoint, constant::ENDPOINT_UNIVERSE);
        assert_universe(&registries.dns_transport, constant::DNS_TRANSPORT_UNIVERSE);
        assert_universe(&registries.service, constant::SERVICE_UNIVERSE);
    }

    fn assert_stub_diagnostics<C: ?Sized>(registry: &Registry<C>) {
        let ctx = null_ctx();
        let stubs: Vec<&str> = registry
            .type_tags()
            .filter(|tag| registry.lookup(tag).unwrap().is_stub())
            .collect();
        for tag in stubs {
            for options in [
                serde_yaml::Value::Null,
                serde_yaml::from_str("{listen: \"127.0.0.1:1080\", junk: true}").unwrap(),
            ] {
                let err = registry
                    .construct(&ctx, tag, "test-instance", options)
                    .err()
                    .unwrap();
                match err {
                    ConstructError::ExcludedByProfile {
                        ref feature,
                        profile,
                        ..
                    } => {
                        assert!(!feature.is_empty());
                        assert_eq!(profile, NAME);
                    }
                    ConstructError::Deprecated { ref feature, .. } => {
                        assert!(!feature.is_empty());
                    }
                    other => panic!("unexpected stub error for {tag}: {other}"),
                }
            }
        }
    }

    /// Constructing any stub of any kind returns a diagnostic naming the
    /// feature, never a panic, whatever the options payload looks like.
    #[tokio::test]
    async fn test_stub_construction_always_diagnoses() {
        let registries = runtime_registries();
        assert_stub_diagnostics(&registries.inbound);
        assert_stub_diagnostics(&registries.outbound);
        assert_stub_diagnostics(&registries.endpoint);
        assert_stub_diagnostics(&registries.dns_transport);
        assert_stub_diagnostics(&registries.service);
    }

    /// The deprecated tag keeps its removal diagnostic in every profile.
    #[tokio::test]
    async fn test_shadowsocksr_is_deprecated_everywhere() {
        let registries = runtime_registries();
        let ctx = null_ctx();

        let err = registries
            .inbound
            .construct(&ctx, constant::TYPE_SHADOWSOCKSR, "ssr", serde_yaml::Value::Null)
            .err()
            .unwrap();
        assert!(matches!(err, ConstructError::Deprecated { .. }));
        assert!(err.to_string().contains("deprecated and removed"));
        assert!(!err.to_string().contains("build"));

        let err = registries
            .outbound
            .construct(&ctx, constant::TYPE_SHADOWSOCKSR, "ssr", serde_yaml::Value::Null)
            .err()
            .unwrap();
        assert!(matches!(err, ConstructError::Deprecated { .. }));
    }

    /// vless stays outbound-only: the inbound tag resolves but is stubbed in
    /// every profile, while the outbound is real in every profile.
    #[test]
    fn test_vless_is_outbound_only() {
        let registries = runtime_registries();
        assert!(
            registries
                .inbound
                .lookup(constant::TYPE_VLESS)
                .unwrap()
                .is_stub()
        );
        assert!(
            !registries
                .outbound
                .lookup(constant::TYPE_VLESS)
                .unwrap()
                .is_stub()
        );
    }

    #[cfg(feature = "full")]
    mod full_profile {
        use super::*;

        #[test]
        fn test_full_real_set() {
            let registries = runtime_registries();
            for tag in [constant::TYPE_TUN, constant::TYPE_MIXED] {
                assert!(!registries.inbound.lookup(tag).unwrap().is_stub());
            }
            for tag in [
                constant::TYPE_DIRECT,
                constant::TYPE_BLOCK,
                constant::TYPE_DNS,
                constant::TYPE_SELECTOR,
                constant::TYPE_URLTEST,
                constant::TYPE_VLESS,
            ] {
                assert!(!registries.outbound.lookup(tag).unwrap().is_stub());
            }
            assert!(
                !registries
                    .endpoint
                    .lookup(constant::TYPE_AWG)
                    .unwrap()
                    .is_stub()
            );
            // Every dns transport is real in the full profile.
            for tag in constant::DNS_TRANSPORT_UNIVERSE {
                assert!(!registries.dns_transport.lookup(tag).unwrap().is_stub());
            }
            assert!(
                !registries
                    .service
                    .lookup(constant::SERVICE_TYPE_RESOLVED)
                    .unwrap()
                    .is_stub()
            );
        }

        #[tokio::test]
        async fn test_wireguard_stub_suggests_awg() {
            let registries = runtime_registries();
            let err = registries
                .endpoint
                .construct(
                    &null_ctx(),
                    constant::TYPE_WIREGUARD,
                    "wg",
                    serde_yaml::Value::Null,
                )
                .unwrap_err();
            let message = err.to_string();
            assert!(message.contains("WireGuard is not included in full build"));
            assert!(message.contains("use awg instead"));
        }
    }

    #[cfg(feature = "reduced")]
    mod reduced_profile {
        use super::*;

        #[tokio::test]
        async fn test_socks_inbound_stub_mentions_mixed() {
            let registries = runtime_registries();
            assert!(
                registries
                    .inbound
                    .lookup(constant::TYPE_SOCKS)
                    .unwrap()
                    .is_stub()
            );
            let err = registries
                .inbound
                .construct(&null_ctx(), constant::TYPE_SOCKS, "socks-in", serde_yaml::Value::Null)
                .unwrap_err();
            let message = err.to_string();
            assert!(message.contains("socks"));
            assert!(message.contains("mixed"));
            assert!(message.contains("reduced build"));
        }

        #[test]
        fn test_vless_outbound_is_real() {
            let registries = runtime_registries();
            assert!(
                !registries
                    .outbound
                    .lookup(constant::TYPE_VLESS)
                    .unwrap()
                    .is_stub()
            );
        }

        #[test]
        fn test_groups_are_stubbed() {
            let registries = runtime_registries();
            for tag in [constant::TYPE_SELECTOR, constant::TYPE_URLTEST] {
                assert!(registries.outbound.lookup(tag).unwrap().is_stub());
            }
        }

        #[test]
        fn test_only_udp_dns_is_real() {
            let registries = runtime_registries();
            for tag in constant::DNS_TRANSPORT_UNIVERSE {
                let is_stub = registries.dns_transport.lookup(tag).unwrap().is_stub();
                assert_eq!(is_stub, *tag != constant::DNS_TYPE_UDP, "{tag}");
            }
        }
    }

    #[cfg(feature = "ultra-reduced")]
    mod ultra_reduced_profile {
        use super::*;

        #[tokio::test]
        async fn test_vless_inbound_stub_but_outbound_real() {
            let registries = runtime_registries();
            assert!(
                registries
                    .inbound
                    .lookup(constant::TYPE_VLESS)
                    .unwrap()
                    .is_stub()
            );
            assert!(
                !registries
                    .outbound
                    .lookup(constant::TYPE_VLESS)
                    .unwrap()
                    .is_stub()
            );
            let err = registries
                .inbound
                .construct(&null_ctx(), constant::TYPE_VLESS, "v-in", serde_yaml::Value::Null)
                .unwrap_err();
            assert!(err.to_string().contains("ultra-reduced build"));
        }

        #[tokio::test]
        async fn test_awg_endpoint_is_stubbed() {
            let registries = runtime_registries();
            assert!(
                registries
                    .endpoint
                    .lookup(constant::TYPE_AWG)
                    .unwrap()
                    .is_stub()
            );
            // The WireGuard stub must not point at another stub.
            let err = registries
                .endpoint
                .construct(
                    &null_ctx(),
                    constant::TYPE_WIREGUARD,
                    "wg",
                    serde_yaml::Value::Null,
                )
                .unwrap_err();
            assert!(!err.to_string().contains("use awg instead"));
        }
    }
}
