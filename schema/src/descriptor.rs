//! The descriptor capability consumed by the delta engine.

use std::fmt;
use std::sync::Arc;

use wire::FieldNumber;

/// Shared handle to a message descriptor.
pub type DescriptorRef = Arc<dyn MessageDescriptor>;

/// Narrow schema lookup used while diffing.
///
/// The engine only needs to know a message's fully-qualified name and which
/// field numbers hold embedded messages; everything else about the schema is
/// irrelevant to delta computation.
pub trait MessageDescriptor: fmt::Debug + Send + Sync {
    /// Fully-qualified message name without a leading dot, e.g. `google.protobuf.Method`.
    fn full_name(&self) -> &str;

    /// Descriptor of the embedded message held by `number`, if that field is
    /// a (singular or repeated) message field.
    fn field_message_descriptor(&self, number: FieldNumber) -> Option<DescriptorRef>;
}
