//! Typed component registries.
//!
//! One registry exists per component kind. A registry maps a configuration
//! type tag (`"vless"`, `"mixed"`, ..) to a constructor whose options shape
//! was fixed at registration time; the options payload itself stays opaque
//! until construction, when it is deserialized into the registered shape.
//!
//! Registries are populated once during profile assembly and sealed before
//! any lookup happens: [`RegistryBuilder`] is the only writer, and
//! [`RegistryBuilder::build`] consumes it, leaving an immutable table that is
//! safe to read from any number of threads without locking.

use std::any::TypeId;

use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;

use crate::adapter::ConstructContext;
use crate::stub::Stub;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ComponentKind {
    Inbound,
    Outbound,
    Endpoint,
    DnsTransport,
    Service,
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ComponentKind::Inbound => write!(f, "inbound"),
            ComponentKind::Outbound => write!(f, "outbound"),
            ComponentKind::Endpoint => write!(f, "endpoint"),
            ComponentKind::DnsTransport => write!(f, "dns transport"),
            ComponentKind::Service => write!(f, "service"),
        }
    }
}

/// Two registrations claimed the same type tag with different options
/// shapes. This is a broken profile table, not bad user input: assembly must
/// stop.
#[derive(Debug)]
pub struct RegistrationConflict {
    pub kind: ComponentKind,
    pub type_tag: &'static str,
    pub registered_shape: &'static str,
    pub offered_shape: &'static str,
}

impl std::fmt::Display for RegistrationConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "conflicting registration for {} type {}: already registered with options {}, offered {}",
            self.kind, self.type_tag, self.registered_shape, self.offered_shape
        )
    }
}

impl std::error::Error for RegistrationConflict {}

/// Why constructing a configured component failed.
#[derive(Debug)]
pub enum ConstructError {
    /// The tag is not part of the configuration schema at all; most likely a
    /// typo in the config.
    UnknownType {
        kind: ComponentKind,
        type_tag: String,
    },
    /// The tag exists but the compiled profile ships it as a stub.
    ExcludedByProfile {
        feature: String,
        profile: &'static str,
        alternative: Option<String>,
    },
    /// The tag was removed from every profile; switching profiles won't help.
    Deprecated {
        feature: String,
        alternative: Option<String>,
    },
    /// The options payload did not match the registered shape.
    InvalidOptions {
        kind: ComponentKind,
        type_tag: &'static str,
        error: serde_yaml::Error,
    },
    /// The real constructor ran and failed.
    Failed(std::io::Error),
}

impl std::fmt::Display for ConstructError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConstructError::UnknownType { kind, type_tag } => {
                write!(f, "unknown {kind} type: {type_tag}")
            }
            ConstructError::ExcludedByProfile {
                feature,
                profile,
                alternative,
            } => {
                write!(f, "{feature} is not included in {profile} build")?;
                if let Some(alternative) = alternative {
                    write!(f, ", use {alternative} instead")?;
                }
                Ok(())
            }
            ConstructError::Deprecated {
                feature,
                alternative,
            } => {
                write!(f, "{feature} is deprecated and removed")?;
                if let Some(alternative) = alternative {
                    write!(f, ", use {alternative} instead")?;
                }
                Ok(())
            }
            ConstructError::InvalidOptions {
                kind,
                type_tag,
                error,
            } => {
                write!(f, "invalid options for {kind} type {type_tag}: {error}")
            }
            ConstructError::Failed(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ConstructError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConstructError::InvalidOptions { error, .. } => Some(error),
            ConstructError::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConstructError> for std::io::Error {
    fn from(e: ConstructError) -> Self {
        match e {
            ConstructError::Failed(inner) => inner,
            other => std::io::Error::other(other.to_string()),
        }
    }
}

type ErasedConstructor<C> = Box<
    dyn Fn(&ConstructContext, &str, serde_yaml::Value) -> Result<Box<C>, ConstructError>
        + Send
        + Sync,
>;

struct Entry<C: ?Sized> {
    options_type: TypeId,
    options_shape: &'static str,
    stub: bool,
    construct: ErasedConstructor<C>,
}

/// Write handle used during profile assembly.
pub struct RegistryBuilder<C: ?Sized> {
    kind: ComponentKind,
    entries: FxHashMap<&'static str, Entry<C>>,
}

impl<C: ?Sized + 'static> RegistryBuilder<C> {
    pub fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            entries: FxHashMap::default(),
        }
    }

    /// Register a real constructor for `type_tag` with options shape `O`.
    ///
    /// Re-registering the same tag with the same shape replaces the entry;
    /// a different shape is a [`RegistrationConflict`].
    pub fn register<O, F>(
        &mut self,
        type_tag: &'static str,
        constructor: F,
    ) -> Result<(), RegistrationConflict>
    where
        O: DeserializeOwned + 'static,
        F: Fn(&ConstructContext, &str, O) -> std::io::Result<Box<C>> + Send + Sync + 'static,
    {
        let kind = self.kind;
        self.insert(
            type_tag,
            TypeId::of::<O>(),
            std::any::type_name::<O>(),
            false,
            Box::new(move |ctx, tag, value| {
                let options: O =
                    serde_yaml::from_value(value).map_err(|error| ConstructError::InvalidOptions {
                        kind,
                        type_tag,
                        error,
                    })?;
                constructor(ctx, tag, options).map_err(ConstructError::Failed)
            }),
        )
    }

    /// Register a stub for `type_tag`: the tag stays resolvable, but
    /// constructing it always fails with the stub's diagnostic.
    pub fn register_stub<O>(
        &mut self,
        type_tag: &'static str,
        stub: Stub,
    ) -> Result<(), RegistrationConflict>
    where
        O: DeserializeOwned + 'static,
    {
        self.insert(
            type_tag,
            TypeId::of::<O>(),
            std::any::type_name::<O>(),
            true,
            Box::new(move |_ctx, _tag, _value| Err(stub.to_error())),
        )
    }

    fn insert(
        &mut self,
        type_tag: &'static str,
        options_type: TypeId,
        options_shape: &'static str,
        stub: bool,
        construct: ErasedConstructor<C>,
    ) -> Result<(), RegistrationConflict> {
        if let Some(existing) = self.entries.get(type_tag)
            && existing.options_type != options_type
        {
            return Err(RegistrationConflict {
                kind: self.kind,
                type_tag,
                registered_shape: existing.options_shape,
                offered_shape: options_shape,
            });
        }
        self.entries.insert(
            type_tag,
            Entry {
                options_type,
                options_shape,
                stub,
                construct,
            },
        );
        Ok(())
    }

    /// Seal the table.
    pub fn build(self) -> Registry<C> {
        Registry {
            kind: self.kind,
            entries: self.entries,
        }
    }
}

/// Sealed, read-only constructor table for one component kind.
pub struct Registry<C: ?Sized> {
    kind: ComponentKind,
    entries: FxHashMap<&'static str, Entry<C>>,
}

pub struct EntryRef<'a> {
    stub: bool,
    options_shape: &'static str,
    _lifetime: std::marker::PhantomData<&'a ()>,
}

impl EntryRef<'_> {
    pub fn is_stub(&self) -> bool {
        self.stub
    }

    pub fn options_shape(&self) -> &'static str {
        self.options_shape
    }
}

impl<C: ?Sized> Registry<C> {
    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn lookup(&self, type_tag: &str) -> Result<EntryRef<'_>, ConstructError> {
        match self.entries.get(type_tag) {
            Some(entry) => Ok(EntryRef {
                stub: entry.stub,
                options_shape: entry.options_shape,
                _lifetime: std::marker::PhantomData,
            }),
            None => Err(ConstructError::UnknownType {
                kind: self.kind,
                type_tag: type_tag.to_string(),
            }),
        }
    }

    /// Resolve `type_tag` and invoke its constructor, passing the options
    /// payload through untouched. The registry validates nothing about the
    /// payload beyond its shape identity.
    pub fn construct(
        &self,
        ctx: &ConstructContext,
        type_tag: &str,
        instance_tag: &str,
        options: serde_yaml::Value,
    ) -> Result<Box<C>, ConstructError> {
        let entry = self
            .entries
            .get(type_tag)
            .ok_or_else(|| ConstructError::UnknownType {
                kind: self.kind,
                type_tag: type_tag.to_string(),
            })?;
        (entry.construct)(ctx, instance_tag, options)
    }

    pub fn type_tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
