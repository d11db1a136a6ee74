//! Message descriptors and extension resolution for pbdelta.
//!
//! This crate defines the narrow schema capability the delta engine needs:
//! - [`MessageDescriptor`]: a message's full name plus "which field numbers hold embedded messages"
//! - [`SchemaPool`]: descriptors built at runtime or from compiled `.proto` files
//! - [`ExtensionDef`] and [`ExtensionRegistry`]: fields grafted onto a message from elsewhere
//!
//! # Design Principles
//!
//! - **Capability, not reflection** - The engine only asks for names and embedded types.
//! - **Two-phase registry** - Extensions are registered through a builder, then frozen.
//! - **Explicit schemas** - Pools are validated up front; unresolved types are errors.

mod descriptor;
mod error;
mod extension;
mod pool;

pub use descriptor::{DescriptorRef, MessageDescriptor};
pub use error::{SchemaError, SchemaResult};
pub use extension::{ExtensionDef, ExtensionRegistry, ExtensionRegistryBuilder};
pub use pool::{FieldDef, MessageDef, PoolMessage, SchemaPool, SchemaPoolBuilder};
pub use wire::FieldNumber;
