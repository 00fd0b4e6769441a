//! Stub constructors for type tags a build profile leaves out.
//!
//! A reduced build still registers every tag the configuration schema knows,
//! so a config written for the full feature set resolves cleanly and fails
//! with a message naming the missing feature instead of an "unknown type"
//! error. The message text is part of the observable contract:
//!
//! - `<feature> is not included in <profile> build[, use <alt> instead]`
//! - `<feature> is deprecated and removed`

use serde::de::{Deserialize, Deserializer, IgnoredAny};

use crate::profile;
use crate::registry::ConstructError;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum StubReason {
    /// Left out of the compiled profile; another profile may carry it.
    ExcludedByProfile,
    /// Removed everywhere. The message must not hint at switching profiles.
    Deprecated,
}

/// Description of a stubbed feature, turned into a failing constructor by
/// [`RegistryBuilder::register_stub`](crate::registry::RegistryBuilder::register_stub).
#[derive(Debug, Clone)]
pub struct Stub {
    feature: String,
    reason: StubReason,
    alternative: Option<String>,
}

impl Stub {
    pub fn excluded(feature: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            reason: StubReason::ExcludedByProfile,
            alternative: None,
        }
    }

    pub fn deprecated(feature: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            reason: StubReason::Deprecated,
            alternative: None,
        }
    }

    /// Name a type tag the operator should use instead.
    pub fn suggest(mut self, alternative: impl Into<String>) -> Self {
        self.alternative = Some(alternative.into());
        self
    }

    pub fn to_error(&self) -> ConstructError {
        match self.reason {
            StubReason::ExcludedByProfile => ConstructError::ExcludedByProfile {
                feature: self.feature.clone(),
                profile: profile::NAME,
                alternative: self.alternative.clone(),
            },
            StubReason::Deprecated => ConstructError::Deprecated {
                feature: self.feature.clone(),
                alternative: self.alternative.clone(),
            },
        }
    }
}

/// Options shape for stubbed tags that have no real implementation in any
/// profile of this crate. Accepts and discards any payload, so configs for
/// the full system still parse.
pub struct IgnoredOptions;

impl<'de> Deserialize<'de> for IgnoredOptions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        IgnoredAny::deserialize(deserializer)?;
        Ok(IgnoredOptions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excluded_message() {
        let err = Stub::excluded("socks inbound").suggest("mixed").to_error();
        let message = err.to_string();
        assert_eq!(
            message,
            format!(
                "socks inbound is not included in {} build, use mixed instead",
                profile::NAME
            )
        );
    }

    #[test]
    fn test_excluded_without_alternative() {
        let err = Stub::excluded("vmess").to_error();
        assert_eq!(
            err.to_string(),
            format!("vmess is not included in {} build", profile::NAME)
        );
    }

    #[test]
    fn test_deprecated_message_names_no_profile() {
        let err = Stub::deprecated("shadowsocksr").to_error();
        assert_eq!(err.to_string(), "shadowsocksr is deprecated and removed");
        assert!(!err.to_string().contains(profile::NAME));
    }

    #[test]
    fn test_ignored_options_accept_anything() {
        serde_yaml::from_str::<IgnoredOptions>("{a: 1, b: [x, y]}").unwrap();
        serde_yaml::from_str::<IgnoredOptions>("null").unwrap();
        serde_yaml::from_str::<IgnoredOptions>("plain string").unwrap();
    }
}
