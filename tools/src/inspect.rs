//! Human-readable reports of delta records.

use std::fmt::Write as _;

use codec::{DeltaKind, FieldDelta, MessageDelta, ValueState};
use prost::Message;
use serde::Serialize;
use wire::FieldValue;

/// How a delta describes its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaEncoding {
    NewIsEmpty,
    OldIsEmpty,
    WholeBuffer,
    FieldLevel,
}

impl From<DeltaKind> for DeltaEncoding {
    fn from(kind: DeltaKind) -> Self {
        match kind {
            DeltaKind::NewIsEmpty => Self::NewIsEmpty,
            DeltaKind::OldIsEmpty => Self::OldIsEmpty,
            DeltaKind::WholeBuffer => Self::WholeBuffer,
            DeltaKind::FieldLevel => Self::FieldLevel,
        }
    }
}

impl DeltaEncoding {
    const fn label(self) -> &'static str {
        match self {
            Self::NewIsEmpty => "new_is_empty",
            Self::OldIsEmpty => "old_is_empty",
            Self::WholeBuffer => "whole_buffer",
            Self::FieldLevel => "field_level",
        }
    }
}

/// Summary of a [`MessageDelta`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeltaReport {
    pub encoding: DeltaEncoding,
    /// Size of the encoded record in bytes.
    pub encoded_len: usize,
    pub old_bytes_len: usize,
    pub new_bytes_len: usize,
    /// Number of leaf field changes, counting through nested messages.
    pub changed_fields: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldReport>,
}

/// One field occurrence change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldReport {
    pub number: u32,
    pub index: u32,
    pub old: String,
    pub new: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldReport>,
}

impl DeltaReport {
    /// Builds a report for `delta`.
    #[must_use]
    pub fn new(delta: &MessageDelta) -> Self {
        let fields: Vec<FieldReport> = delta.fields.iter().map(FieldReport::new).collect();
        Self {
            encoding: delta.kind().into(),
            encoded_len: delta.encoded_len(),
            old_bytes_len: delta.old_bytes.len(),
            new_bytes_len: delta.new_bytes.len(),
            changed_fields: fields.iter().map(FieldReport::leaf_count).sum(),
            fields,
        }
    }
}

impl FieldReport {
    fn new(field: &FieldDelta) -> Self {
        let flags = field.field_flags();
        let nested = !field.fields.is_empty();
        let (old, new) = if flags.is_unchanged() {
            ("unchanged".to_string(), "unchanged".to_string())
        } else {
            let old = describe_side(
                flags.old_state(),
                flags.raw(),
                field.explicit_old_value(),
                nested,
                "embedded",
            );
            let new = describe_side(
                flags.new_state(),
                flags.raw(),
                field.explicit_new_value(),
                nested,
                "patched",
            );
            (old, new)
        };
        Self {
            number: field.number,
            index: field.index,
            old,
            new,
            fields: field.fields.iter().map(Self::new).collect(),
        }
    }

    fn leaf_count(&self) -> usize {
        if self.fields.is_empty() {
            1
        } else {
            self.fields.iter().map(Self::leaf_count).sum()
        }
    }
}

fn describe_side(
    state: Option<ValueState>,
    flags: u32,
    explicit: Option<FieldValue<'_>>,
    nested: bool,
    nested_label: &str,
) -> String {
    match (state, explicit) {
        (None, _) => format!("unknown flags 0x{flags:x}"),
        (Some(ValueState::Explicit), Some(value)) => describe(&value),
        (Some(ValueState::Explicit), None) if nested => nested_label.to_string(),
        (Some(ValueState::Explicit), None) => "missing".to_string(),
        (Some(state), _) => describe_state(state),
    }
}

fn describe_state(state: ValueState) -> String {
    match state {
        ValueState::NotSet => "not set",
        ValueState::EmptyBytes => "empty bytes",
        ValueState::DefaultVarint => "varint 0",
        ValueState::DefaultFixed32 => "fixed32 0",
        ValueState::DefaultFixed64 => "fixed64 0",
        ValueState::SetElsewhere => "set elsewhere",
        ValueState::Explicit => "explicit",
    }
    .to_string()
}

fn describe(value: &FieldValue<'_>) -> String {
    match value {
        FieldValue::Varint(v) => format!("varint {v}"),
        FieldValue::Fixed32(v) => format!("fixed32 {v}"),
        FieldValue::Fixed64(v) => format!("fixed64 {v}"),
        FieldValue::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) if !text.chars().any(char::is_control) => format!("{text:?}"),
            _ => {
                let mut hex = String::with_capacity(bytes.len().min(16) * 2);
                for byte in bytes.iter().take(16) {
                    let _ = write!(hex, "{byte:02x}");
                }
                let ellipsis = if bytes.len() > 16 { ".." } else { "" };
                format!("bytes[{}] {hex}{ellipsis}", bytes.len())
            }
        },
    }
}

/// Renders a report as indented text.
#[must_use]
pub fn format_report_pretty(report: &DeltaReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "encoding: {} ({} bytes)",
        report.encoding.label(),
        report.encoded_len
    );
    match report.encoding {
        DeltaEncoding::FieldLevel => {
            let _ = writeln!(out, "changed fields: {}", report.changed_fields);
            for field in &report.fields {
                write_field(&mut out, field, 1);
            }
        }
        DeltaEncoding::NewIsEmpty => {
            let _ = writeln!(out, "old: {} bytes", report.old_bytes_len);
        }
        DeltaEncoding::OldIsEmpty => {
            let _ = writeln!(out, "new: {} bytes", report.new_bytes_len);
        }
        DeltaEncoding::WholeBuffer => {
            let _ = writeln!(
                out,
                "old: {} bytes, new: {} bytes",
                report.old_bytes_len, report.new_bytes_len
            );
        }
    }
    out
}

fn write_field(out: &mut String, field: &FieldReport, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = writeln!(
        out,
        "{indent}{}[{}]: {} -> {}",
        field.number, field.index, field.old, field.new
    );
    for nested in &field.fields {
        write_field(out, nested, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use codec::FieldFlags;

    use super::*;

    fn sample() -> MessageDelta {
        MessageDelta::field_level(vec![
            FieldDelta {
                number: 1,
                old_bytes: b"foo".to_vec(),
                new_bytes: b"bar".to_vec(),
                ..FieldDelta::default()
            },
            FieldDelta {
                number: 3,
                flags: FieldFlags::NEW_IS_NOT_SET,
                old_varint: 1,
                ..FieldDelta::default()
            },
            FieldDelta {
                number: 6,
                fields: vec![
                    FieldDelta {
                        number: 1,
                        old_bytes: vec![0, 1, 2],
                        flags: FieldFlags::NEW_IS_EMPTY_BYTES,
                        ..FieldDelta::default()
                    },
                    FieldDelta {
                        number: 2,
                        flags: FieldFlags::UNCHANGED,
                        ..FieldDelta::default()
                    },
                ],
                ..FieldDelta::default()
            },
        ])
    }

    #[test]
    fn report_counts_leaf_changes() {
        let report = DeltaReport::new(&sample());
        assert_eq!(report.encoding, DeltaEncoding::FieldLevel);
        assert_eq!(report.changed_fields, 4);
        assert_eq!(report.fields[0].old, "\"foo\"");
        assert_eq!(report.fields[1].new, "not set");
        assert_eq!(report.fields[2].old, "embedded");
        assert_eq!(report.fields[2].new, "patched");
        assert_eq!(report.fields[2].fields[0].old, "bytes[3] 000102");
        assert_eq!(report.fields[2].fields[1].old, "unchanged");
        assert_eq!(report.fields[2].fields[1].new, "unchanged");
    }

    #[test]
    fn pretty_output_indents_nested_fields() {
        let text = format_report_pretty(&DeltaReport::new(&sample()));
        assert!(text.starts_with("encoding: field_level"));
        assert!(text.contains("\n  1[0]: \"foo\" -> \"bar\"\n"));
        assert!(text.contains("\n    1[0]: bytes[3] 000102 -> empty bytes\n"));
    }

    #[test]
    fn json_output_names_encoding() {
        let report = DeltaReport::new(&MessageDelta::whole_buffer(vec![1], vec![2, 3]));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["encoding"], "whole_buffer");
        assert_eq!(json["new_bytes_len"], 2);
        assert!(json.get("fields").is_none());
        assert!(format_report_pretty(&report).contains("old: 1 bytes, new: 2 bytes"));
    }
}
