//! Changelog maintenance and debugging tools for pbdelta.
//!
//! This crate provides utilities built on the delta engine:
//!
//! - Keep an append-only delta history of each `.proto` file's descriptor
//! - Describe `google/protobuf/descriptor.proto` so descriptor deltas recurse
//! - Render delta records for humans and as JSON
//!
//! # Design Principles
//!
//! - **First-class tooling** - These tools are part of the product, not afterthoughts.
//! - **Human-readable output** - Make it easy to understand what a delta changes.

pub mod changelog;
pub mod descriptor;
pub mod inspect;

pub use changelog::{changelog_path, ChangeEntry, Changelog, ChangelogUpdate, Replayed};
pub use descriptor::{descriptor_pool, file_descriptor_descriptor, DescriptorSet, SourceFile};
pub use inspect::{format_report_pretty, DeltaEncoding, DeltaReport, FieldReport};
