//! Extension fields and the registry that resolves them.

use std::collections::HashMap;
use std::sync::Arc;

use prost_types::field_descriptor_proto::Type;
use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use wire::FieldNumber;

use crate::descriptor::{DescriptorRef, MessageDescriptor};
use crate::error::{SchemaError, SchemaResult};
use crate::pool::{qualify, strip_leading_dot, SchemaPool};

/// A message-typed extension field declared outside its extendee.
///
/// As a descriptor it answers for the extendee's name and resolves exactly
/// one field number: its own.
#[derive(Debug, Clone)]
pub struct ExtensionDef {
    extendee: String,
    number: FieldNumber,
    message: DescriptorRef,
}

impl ExtensionDef {
    /// Creates an extension of `extendee` at `number` holding `message`.
    #[must_use]
    pub fn new(extendee: impl Into<String>, number: FieldNumber, message: DescriptorRef) -> Self {
        Self {
            extendee: extendee.into(),
            number,
            message,
        }
    }

    /// Returns the extension's field number.
    #[must_use]
    pub const fn number(&self) -> FieldNumber {
        self.number
    }

    /// Returns the embedded message descriptor.
    #[must_use]
    pub fn message(&self) -> &DescriptorRef {
        &self.message
    }

    /// Collects every message-typed extension declared in `files`.
    ///
    /// Both file-level and message-nested `extend` blocks are scanned.
    /// Extension message types resolve against `pool`.
    pub fn collect(
        files: &[FileDescriptorProto],
        pool: &Arc<SchemaPool>,
    ) -> SchemaResult<Vec<Self>> {
        let mut out = Vec::new();
        for file in files {
            let scope = file.package();
            for field in &file.extension {
                push_extension(scope, field, pool, &mut out)?;
            }
            for message in &file.message_type {
                collect_nested(scope, message, pool, &mut out)?;
            }
        }
        Ok(out)
    }
}

impl MessageDescriptor for ExtensionDef {
    fn full_name(&self) -> &str {
        &self.extendee
    }

    fn field_message_descriptor(&self, number: FieldNumber) -> Option<DescriptorRef> {
        (number == self.number).then(|| Arc::clone(&self.message))
    }
}

fn collect_nested(
    scope: &str,
    message: &DescriptorProto,
    pool: &Arc<SchemaPool>,
    out: &mut Vec<ExtensionDef>,
) -> SchemaResult<()> {
    let scope = qualify(scope, message.name());
    for field in &message.extension {
        push_extension(&scope, field, pool, out)?;
    }
    for nested in &message.nested_type {
        collect_nested(&scope, nested, pool, out)?;
    }
    Ok(())
}

fn push_extension(
    scope: &str,
    field: &FieldDescriptorProto,
    pool: &Arc<SchemaPool>,
    out: &mut Vec<ExtensionDef>,
) -> SchemaResult<()> {
    if field.r#type() != Type::Message {
        return Ok(());
    }
    let name = qualify(scope, field.name());
    let number = u32::try_from(field.number())
        .ok()
        .and_then(FieldNumber::new)
        .ok_or_else(|| SchemaError::InvalidFieldNumber {
            message: name.clone(),
            number: i64::from(field.number()),
        })?;
    let type_name = strip_leading_dot(field.type_name());
    let message = pool
        .descriptor(type_name)
        .ok_or_else(|| SchemaError::UnresolvedType {
            message: strip_leading_dot(field.extendee()).to_owned(),
            field: name,
            type_name: type_name.to_owned(),
        })?;
    out.push(ExtensionDef::new(
        strip_leading_dot(field.extendee()),
        number,
        message,
    ));
    Ok(())
}

/// Collects extension descriptors before any delta is computed.
///
/// Registration happens here, single-threaded; [`build`](Self::build)
/// freezes the result into an [`ExtensionRegistry`] that is only ever read.
#[derive(Debug, Default)]
pub struct ExtensionRegistryBuilder {
    by_extendee: HashMap<String, Vec<DescriptorRef>>,
}

impl ExtensionRegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an extension under `descriptor.full_name()`.
    ///
    /// Later registrations for the same extendee are consulted after earlier ones.
    pub fn register(&mut self, descriptor: DescriptorRef) -> &mut Self {
        self.by_extendee
            .entry(descriptor.full_name().to_owned())
            .or_default()
            .push(descriptor);
        self
    }

    /// Registers every extension in `extensions`.
    pub fn register_all(
        &mut self,
        extensions: impl IntoIterator<Item = ExtensionDef>,
    ) -> &mut Self {
        for extension in extensions {
            self.register(Arc::new(extension));
        }
        self
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> ExtensionRegistry {
        ExtensionRegistry {
            by_extendee: Arc::new(self.by_extendee),
        }
    }
}

/// Immutable snapshot of registered extensions, keyed by extendee name.
///
/// Cloning is cheap and the snapshot is safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    by_extendee: Arc<HashMap<String, Vec<DescriptorRef>>>,
}

impl ExtensionRegistry {
    /// Returns a registry with no extensions.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a registration-phase builder.
    #[must_use]
    pub fn builder() -> ExtensionRegistryBuilder {
        ExtensionRegistryBuilder::new()
    }

    /// Returns the extensions registered for `extendee`, in registration order.
    #[must_use]
    pub fn extensions_for(&self, extendee: &str) -> &[DescriptorRef] {
        self.by_extendee
            .get(extendee)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the total number of registered extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_extendee.values().map(Vec::len).sum()
    }

    /// Returns `true` if nothing was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_extendee.is_empty()
    }

    /// Resolves the embedded message descriptor held by `number`.
    ///
    /// The descriptor itself is asked first; failing that, each extension
    /// registered for its full name is asked in registration order.
    #[must_use]
    pub fn resolve_embedded(
        &self,
        descriptor: &dyn MessageDescriptor,
        number: FieldNumber,
    ) -> Option<DescriptorRef> {
        descriptor.field_message_descriptor(number).or_else(|| {
            self.extensions_for(descriptor.full_name())
                .iter()
                .find_map(|extension| extension.field_message_descriptor(number))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldDef, MessageDef};

    fn num(raw: u32) -> FieldNumber {
        FieldNumber::new(raw).unwrap()
    }

    fn pool() -> Arc<SchemaPool> {
        SchemaPool::builder()
            .message(MessageDef::new("base.Host").field(FieldDef::scalar(1, "name")))
            .message(MessageDef::new("ext.Payload").field(FieldDef::scalar(1, "body")))
            .message(MessageDef::new("ext.Other"))
            .build()
            .unwrap()
    }

    #[test]
    fn own_descriptor_wins() {
        let pool = pool();
        let host = pool.descriptor("base.Host").unwrap();
        let registry = ExtensionRegistry::empty();
        assert!(registry.resolve_embedded(host.as_ref(), num(1)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn falls_back_to_extensions_in_order() {
        let pool = pool();
        let host = pool.descriptor("base.Host").unwrap();
        let payload = pool.descriptor("ext.Payload").unwrap();
        let other = pool.descriptor("ext.Other").unwrap();

        let mut builder = ExtensionRegistry::builder();
        builder
            .register(Arc::new(ExtensionDef::new("base.Host", num(100), payload)))
            .register(Arc::new(ExtensionDef::new("base.Host", num(100), other.clone())))
            .register(Arc::new(ExtensionDef::new("base.Host", num(101), other)));
        let registry = builder.build();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.extensions_for("base.Host").len(), 3);
        assert!(registry.extensions_for("base.Missing").is_empty());

        let first = registry.resolve_embedded(host.as_ref(), num(100)).unwrap();
        assert_eq!(first.full_name(), "ext.Payload");
        let second = registry.resolve_embedded(host.as_ref(), num(101)).unwrap();
        assert_eq!(second.full_name(), "ext.Other");
        assert!(registry.resolve_embedded(host.as_ref(), num(102)).is_none());
    }

    #[test]
    fn extension_only_answers_its_number() {
        let pool = pool();
        let payload = pool.descriptor("ext.Payload").unwrap();
        let ext = ExtensionDef::new("base.Host", num(7), payload);
        assert_eq!(ext.full_name(), "base.Host");
        assert_eq!(ext.number(), num(7));
        assert!(ext.field_message_descriptor(num(7)).is_some());
        assert!(ext.field_message_descriptor(num(8)).is_none());
    }

    #[test]
    fn collects_extensions_from_files() {
        let payload_file = FileDescriptorProto {
            name: Some("ext.proto".to_string()),
            package: Some("ext".to_string()),
            message_type: vec![DescriptorProto {
                name: Some("Payload".to_string()),
                extension: vec![FieldDescriptorProto {
                    name: Some("nested_payload".to_string()),
                    number: Some(201),
                    r#type: Some(Type::Message as i32),
                    type_name: Some(".ext.Payload".to_string()),
                    extendee: Some(".base.Host".to_string()),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            extension: vec![
                FieldDescriptorProto {
                    name: Some("payload".to_string()),
                    number: Some(200),
                    r#type: Some(Type::Message as i32),
                    type_name: Some(".ext.Payload".to_string()),
                    extendee: Some(".base.Host".to_string()),
                    ..Default::default()
                },
                FieldDescriptorProto {
                    name: Some("flag".to_string()),
                    number: Some(202),
                    r#type: Some(Type::Bool as i32),
                    extendee: Some(".base.Host".to_string()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let pool = pool();
        let extensions = ExtensionDef::collect(&[payload_file], &pool).unwrap();
        let numbers: Vec<u32> = extensions.iter().map(|ext| ext.number().get()).collect();
        assert_eq!(numbers, vec![200, 201]);
        assert!(extensions
            .iter()
            .all(|ext| ext.full_name() == "base.Host"));

        let mut builder = ExtensionRegistry::builder();
        builder.register_all(extensions);
        let registry = builder.build();
        let host = pool.descriptor("base.Host").unwrap();
        let resolved = registry.resolve_embedded(host.as_ref(), num(201)).unwrap();
        assert_eq!(resolved.full_name(), "ext.Payload");
    }

    #[test]
    fn unresolved_extension_type_is_an_error() {
        let file = FileDescriptorProto {
            extension: vec![FieldDescriptorProto {
                name: Some("missing".to_string()),
                number: Some(5),
                r#type: Some(Type::Message as i32),
                type_name: Some(".nowhere.Missing".to_string()),
                extendee: Some(".base.Host".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let err = ExtensionDef::collect(&[file], &pool()).unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedType { .. }));
    }

    #[test]
    fn registry_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ExtensionRegistry>();
    }
}
