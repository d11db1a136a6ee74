//! Runtime-built message schemas.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use prost_types::field_descriptor_proto::Type;
use prost_types::{DescriptorProto, FileDescriptorProto};
use wire::FieldNumber;

use crate::descriptor::{DescriptorRef, MessageDescriptor};
use crate::error::{SchemaError, SchemaResult};

/// A field definition within a message.
///
/// Only message-typed fields matter for delta computation; scalar fields are
/// kept so definitions read like the schema they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldDef {
    pub number: u32,
    pub name: String,
    /// Fully-qualified name of the embedded message type, if any.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub message_type: Option<String>,
}

impl FieldDef {
    /// Creates a scalar (non-message) field.
    #[must_use]
    pub fn scalar(number: u32, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
            message_type: None,
        }
    }

    /// Creates a field holding an embedded message of `message_type`.
    #[must_use]
    pub fn message(number: u32, name: impl Into<String>, message_type: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
            message_type: Some(message_type.into()),
        }
    }
}

/// A message definition.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MessageDef {
    pub full_name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub fields: Vec<FieldDef>,
}

impl MessageDef {
    /// Creates a message with no fields.
    #[must_use]
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field to the message.
    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }
}

#[derive(Debug)]
struct CompiledMessage {
    def: MessageDef,
    embedded: HashMap<FieldNumber, usize>,
}

/// A validated set of message definitions with resolved cross-references.
pub struct SchemaPool {
    messages: Vec<CompiledMessage>,
    by_name: HashMap<String, usize>,
}

impl SchemaPool {
    /// Creates a pool from message definitions after validation.
    pub fn new(defs: Vec<MessageDef>) -> SchemaResult<Self> {
        let mut by_name = HashMap::with_capacity(defs.len());
        for (index, def) in defs.iter().enumerate() {
            if by_name.insert(def.full_name.clone(), index).is_some() {
                return Err(SchemaError::DuplicateMessage {
                    name: def.full_name.clone(),
                });
            }
        }

        let mut messages = Vec::with_capacity(defs.len());
        for def in defs {
            let embedded = resolve_fields(&def, &by_name)?;
            messages.push(CompiledMessage { def, embedded });
        }

        Ok(Self { messages, by_name })
    }

    /// Creates a pool builder.
    #[must_use]
    pub fn builder() -> SchemaPoolBuilder {
        SchemaPoolBuilder::default()
    }

    /// Builds a pool from compiled `.proto` files.
    ///
    /// Every message type, including nested ones, becomes a definition.
    /// Message-typed fields must resolve within `files`, so descriptor sets
    /// should be produced with their imports included.
    pub fn from_file_descriptors(files: &[FileDescriptorProto]) -> SchemaResult<Self> {
        let mut defs = Vec::new();
        for file in files {
            for message in &file.message_type {
                collect_message(file.package(), message, &mut defs);
            }
        }
        Self::new(defs)
    }

    /// Returns the number of messages in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if the pool defines no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Looks up a message definition by full name.
    #[must_use]
    pub fn message(&self, full_name: &str) -> Option<&MessageDef> {
        self.by_name
            .get(full_name)
            .map(|&index| &self.messages[index].def)
    }

    /// Iterates message definitions in insertion order.
    pub fn messages(&self) -> impl Iterator<Item = &MessageDef> {
        self.messages.iter().map(|message| &message.def)
    }

    /// Returns a descriptor handle for `full_name`.
    #[must_use]
    pub fn descriptor(self: &Arc<Self>, full_name: &str) -> Option<DescriptorRef> {
        let index = *self.by_name.get(full_name)?;
        Some(self.handle(index))
    }

    fn handle(self: &Arc<Self>, index: usize) -> DescriptorRef {
        Arc::new(PoolMessage {
            pool: Arc::clone(self),
            index,
        })
    }
}

impl fmt::Debug for SchemaPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaPool")
            .field("messages", &self.messages.len())
            .finish()
    }
}

/// Builder for `SchemaPool`.
#[derive(Debug, Default)]
pub struct SchemaPoolBuilder {
    messages: Vec<MessageDef>,
}

impl SchemaPoolBuilder {
    /// Adds a message definition.
    #[must_use]
    pub fn message(mut self, message: MessageDef) -> Self {
        self.messages.push(message);
        self
    }

    /// Builds the shared pool after validation.
    pub fn build(self) -> SchemaResult<Arc<SchemaPool>> {
        SchemaPool::new(self.messages).map(Arc::new)
    }
}

/// Descriptor handle pointing at one message of a `SchemaPool`.
#[derive(Clone)]
pub struct PoolMessage {
    pool: Arc<SchemaPool>,
    index: usize,
}

impl PoolMessage {
    /// Returns the underlying definition.
    #[must_use]
    pub fn def(&self) -> &MessageDef {
        &self.pool.messages[self.index].def
    }
}

impl MessageDescriptor for PoolMessage {
    fn full_name(&self) -> &str {
        &self.def().full_name
    }

    fn field_message_descriptor(&self, number: FieldNumber) -> Option<DescriptorRef> {
        let index = *self.pool.messages[self.index].embedded.get(&number)?;
        Some(self.pool.handle(index))
    }
}

impl fmt::Debug for PoolMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolMessage")
            .field("full_name", &self.full_name())
            .finish()
    }
}

fn resolve_fields(
    def: &MessageDef,
    by_name: &HashMap<String, usize>,
) -> SchemaResult<HashMap<FieldNumber, usize>> {
    let mut seen = HashSet::new();
    let mut embedded = HashMap::new();
    for field in &def.fields {
        let number =
            FieldNumber::new(field.number).ok_or_else(|| SchemaError::InvalidFieldNumber {
                message: def.full_name.clone(),
                number: i64::from(field.number),
            })?;
        if !seen.insert(number) {
            return Err(SchemaError::DuplicateFieldNumber {
                message: def.full_name.clone(),
                number: field.number,
            });
        }
        if let Some(type_name) = &field.message_type {
            let index = by_name
                .get(type_name)
                .ok_or_else(|| SchemaError::UnresolvedType {
                    message: def.full_name.clone(),
                    field: field.name.clone(),
                    type_name: type_name.clone(),
                })?;
            embedded.insert(number, *index);
        }
    }
    Ok(embedded)
}

fn collect_message(scope: &str, message: &DescriptorProto, out: &mut Vec<MessageDef>) {
    let full_name = qualify(scope, message.name());
    let fields = message
        .field
        .iter()
        .map(|field| FieldDef {
            // Negative numbers map to zero and fail validation.
            number: u32::try_from(field.number()).unwrap_or(0),
            name: field.name().to_owned(),
            message_type: (field.r#type() == Type::Message)
                .then(|| strip_leading_dot(field.type_name()).to_owned()),
        })
        .collect();
    for nested in &message.nested_type {
        collect_message(&full_name, nested, out);
    }
    out.push(MessageDef { full_name, fields });
}

pub(crate) fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_owned()
    } else {
        format!("{scope}.{name}")
    }
}

pub(crate) fn strip_leading_dot(name: &str) -> &str {
    name.strip_prefix('.').unwrap_or(name)
}
