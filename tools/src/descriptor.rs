//! Descriptor sets and the schema of `google/protobuf/descriptor.proto`.

use std::sync::Arc;

use anyhow::{Context, Result};
use glob::Pattern;
use prost::Message;
use prost_types::FileDescriptorProto;
use schema::{ExtensionDef, ExtensionRegistry, FieldDef, FieldNumber, MessageDef, SchemaPool};
use wire::{Limits, ParsedMessage};

/// `FileDescriptorSet.file`
const SET_FILE: FieldNumber = field(1);
/// `FileDescriptorProto.source_code_info`
const SOURCE_CODE_INFO: FieldNumber = field(9);

const FILE_DESCRIPTOR_PROTO: &str = "google.protobuf.FileDescriptorProto";

/// Path prefix of the protobuf well-known types bundled with protoc.
pub const WELL_KNOWN_PREFIX: &str = "google/protobuf/";

// Message-typed fields of descriptor.proto: (message, [(number, field, type)]).
// Scalar fields are irrelevant to delta computation and left out.
const DESCRIPTOR_MESSAGES: &[(&str, &[(u32, &str, &str)])] = &[
    ("FileDescriptorSet", &[(1, "file", "FileDescriptorProto")]),
    (
        "FileDescriptorProto",
        &[
            (4, "message_type", "DescriptorProto"),
            (5, "enum_type", "EnumDescriptorProto"),
            (6, "service", "ServiceDescriptorProto"),
            (7, "extension", "FieldDescriptorProto"),
            (8, "options", "FileOptions"),
            (9, "source_code_info", "SourceCodeInfo"),
        ],
    ),
    (
        "DescriptorProto",
        &[
            (2, "field", "FieldDescriptorProto"),
            (3, "nested_type", "DescriptorProto"),
            (4, "enum_type", "EnumDescriptorProto"),
            (5, "extension_range", "DescriptorProto.ExtensionRange"),
            (6, "extension", "FieldDescriptorProto"),
            (7, "options", "MessageOptions"),
            (8, "oneof_decl", "OneofDescriptorProto"),
            (9, "reserved_range", "DescriptorProto.ReservedRange"),
        ],
    ),
    (
        "DescriptorProto.ExtensionRange",
        &[(3, "options", "ExtensionRangeOptions")],
    ),
    ("DescriptorProto.ReservedRange", &[]),
    (
        "ExtensionRangeOptions",
        &[
            (2, "declaration", "ExtensionRangeOptions.Declaration"),
            (50, "features", "FeatureSet"),
            (999, "uninterpreted_option", "UninterpretedOption"),
        ],
    ),
    ("ExtensionRangeOptions.Declaration", &[]),
    ("FieldDescriptorProto", &[(8, "options", "FieldOptions")]),
    ("OneofDescriptorProto", &[(2, "options", "OneofOptions")]),
    (
        "EnumDescriptorProto",
        &[
            (2, "value", "EnumValueDescriptorProto"),
            (3, "options", "EnumOptions"),
            (4, "reserved_range", "EnumDescriptorProto.EnumReservedRange"),
        ],
    ),
    ("EnumDescriptorProto.EnumReservedRange", &[]),
    ("EnumValueDescriptorProto", &[(3, "options", "EnumValueOptions")]),
    (
        "ServiceDescriptorProto",
        &[
            (2, "method", "MethodDescriptorProto"),
            (3, "options", "ServiceOptions"),
        ],
    ),
    ("MethodDescriptorProto", &[(4, "options", "MethodOptions")]),
    (
        "FileOptions",
        &[
            (50, "features", "FeatureSet"),
            (999, "uninterpreted_option", "UninterpretedOption"),
        ],
    ),
    (
        "MessageOptions",
        &[
            (12, "features", "FeatureSet"),
            (999, "uninterpreted_option", "UninterpretedOption"),
        ],
    ),
    (
        "FieldOptions",
        &[
            (20, "edition_defaults", "FieldOptions.EditionDefault"),
            (21, "features", "FeatureSet"),
            (22, "feature_support", "FieldOptions.FeatureSupport"),
            (999, "uninterpreted_option", "UninterpretedOption"),
        ],
    ),
    ("FieldOptions.EditionDefault", &[]),
    ("FieldOptions.FeatureSupport", &[]),
    (
        "OneofOptions",
        &[
            (1, "features", "FeatureSet"),
            (999, "uninterpreted_option", "UninterpretedOption"),
        ],
    ),
    (
        "EnumOptions",
        &[
            (7, "features", "FeatureSet"),
            (999, "uninterpreted_option", "UninterpretedOption"),
        ],
    ),
    (
        "EnumValueOptions",
        &[
            (2, "features", "FeatureSet"),
            (4, "feature_support", "FieldOptions.FeatureSupport"),
            (999, "uninterpreted_option", "UninterpretedOption"),
        ],
    ),
    (
        "ServiceOptions",
        &[
            (34, "features", "FeatureSet"),
            (999, "uninterpreted_option", "UninterpretedOption"),
        ],
    ),
    (
        "MethodOptions",
        &[
            (35, "features", "FeatureSet"),
            (999, "uninterpreted_option", "UninterpretedOption"),
        ],
    ),
    (
        "UninterpretedOption",
        &[(2, "name", "UninterpretedOption.NamePart")],
    ),
    ("UninterpretedOption.NamePart", &[]),
    ("FeatureSet", &[]),
    ("SourceCodeInfo", &[(1, "location", "SourceCodeInfo.Location")]),
    ("SourceCodeInfo.Location", &[]),
];

/// Builds a pool describing `google/protobuf/descriptor.proto`.
///
/// Only embedded-message fields are modelled, which is all the delta engine
/// consults. Message names carry the `google.protobuf.` prefix.
pub fn descriptor_pool() -> Result<Arc<SchemaPool>> {
    let mut builder = SchemaPool::builder();
    for (message, fields) in DESCRIPTOR_MESSAGES {
        let mut def = MessageDef::new(format!("google.protobuf.{message}"));
        for (number, name, type_name) in *fields {
            def = def.field(FieldDef::message(
                *number,
                *name,
                format!("google.protobuf.{type_name}"),
            ));
        }
        builder = builder.message(def);
    }
    builder.build().context("build descriptor.proto schema")
}

/// One file of a descriptor set.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// The decoded descriptor, used for names, schemas and extensions.
    pub proto: FileDescriptorProto,
    /// The file's canonical encoding without `source_code_info`.
    ///
    /// Taken from the raw set bytes so extension options that `prost_types`
    /// does not model survive.
    pub state: Vec<u8>,
}

impl SourceFile {
    /// Returns the file's path as recorded by protoc, e.g. `foo/bar.proto`.
    #[must_use]
    pub fn name(&self) -> &str {
        self.proto.name()
    }

    /// Returns `true` for files under `google/protobuf/`.
    #[must_use]
    pub fn is_well_known(&self) -> bool {
        self.name().starts_with(WELL_KNOWN_PREFIX)
    }
}

/// A decoded `FileDescriptorSet`.
#[derive(Debug, Clone, Default)]
pub struct DescriptorSet {
    pub files: Vec<SourceFile>,
}

impl DescriptorSet {
    /// Decodes an encoded `FileDescriptorSet` (as written by
    /// `protoc --descriptor_set_out`).
    pub fn decode(bytes: &[u8], limits: &Limits) -> Result<Self> {
        let set = ParsedMessage::parse(bytes, limits).context("parse descriptor set")?;
        let mut files = Vec::new();
        for value in set.get(SET_FILE) {
            let raw = value
                .as_bytes()
                .context("descriptor set file entry is not length-delimited")?;
            let proto = FileDescriptorProto::decode(raw).context("decode file descriptor")?;
            let mut parsed = ParsedMessage::parse(raw, limits)
                .with_context(|| format!("parse file descriptor {}", proto.name()))?;
            parsed.remove(SOURCE_CODE_INFO);
            files.push(SourceFile {
                proto,
                state: parsed.encode(),
            });
        }
        Ok(Self { files })
    }

    /// Returns the files a changelog run should track.
    ///
    /// With a pattern, every file whose path matches it. Without one, every
    /// file except the well-known types pulled in by `--include_imports`.
    pub fn targets<'s>(
        &'s self,
        pattern: Option<&'s Pattern>,
    ) -> impl Iterator<Item = &'s SourceFile> + 's {
        self.files.iter().filter(move |file| match pattern {
            Some(pattern) => pattern.matches(file.name()),
            None => !file.is_well_known(),
        })
    }

    /// Returns the decoded descriptors.
    #[must_use]
    pub fn protos(&self) -> Vec<FileDescriptorProto> {
        self.files.iter().map(|file| file.proto.clone()).collect()
    }

    /// Builds a pool of every message declared in the set.
    pub fn pool(&self) -> Result<Arc<SchemaPool>> {
        let pool = SchemaPool::from_file_descriptors(&self.protos())
            .context("build schema from descriptor set")?;
        Ok(Arc::new(pool))
    }

    /// Registers every message-typed extension declared in the set.
    pub fn extensions(&self, pool: &Arc<SchemaPool>) -> Result<ExtensionRegistry> {
        let extensions =
            ExtensionDef::collect(&self.protos(), pool).context("collect extensions")?;
        let mut builder = ExtensionRegistry::builder();
        builder.register_all(extensions);
        Ok(builder.build())
    }
}

/// Returns the descriptor for `FileDescriptorProto`.
pub fn file_descriptor_descriptor(pool: &Arc<SchemaPool>) -> Result<schema::DescriptorRef> {
    pool.descriptor(FILE_DESCRIPTOR_PROTO)
        .with_context(|| format!("{FILE_DESCRIPTOR_PROTO} missing from schema"))
}

const fn field(number: u32) -> FieldNumber {
    match FieldNumber::new(number) {
        Some(number) => number,
        None => panic!("field number out of range"),
    }
}
