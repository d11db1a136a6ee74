//! Append-only changelogs of a schema file's descriptor.
//!
//! A changelog is a list of encoded [`MessageDelta`]s. Replaying every entry
//! from the empty message reconstructs the descriptor as of the last entry.
//! The newest entry may be marked uncommitted; it is recomputed on every
//! update until it is committed.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::Engine;
use codec::{apply_delta, compute_delta, decode_delta, encode_delta, CodecLimits};
use schema::{ExtensionRegistry, MessageDescriptor};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// File name suffix for changelogs.
pub const CHANGELOG_EXTENSION: &str = "changes.json";

/// One recorded delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// Encoded [`codec::MessageDelta`].
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub uncommitted: bool,
}

/// A schema file's delta history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changelog {
    #[serde(default)]
    pub entries: Vec<ChangeEntry>,
}

/// State reconstructed from a changelog's committed entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replayed {
    /// Canonical encoding after the last committed entry.
    pub state: Vec<u8>,
    /// Number of committed entries.
    pub committed: usize,
}

/// Outcome of [`Changelog::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangelogUpdate {
    /// The changelog already describes the current state.
    Unchanged,
    /// The changelog must be rewritten with these contents.
    Rewritten(Changelog),
}

impl Changelog {
    /// Reads a changelog; a missing file is an empty changelog.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("parse changelog {}", path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err).with_context(|| format!("read changelog {}", path.display())),
        }
    }

    /// Writes the changelog as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
        let mut json = serde_json::to_string_pretty(self).context("serialize changelog")?;
        json.push('\n');
        fs::write(path, json).with_context(|| format!("write changelog {}", path.display()))
    }

    /// Returns `true` if the last entry is uncommitted.
    #[must_use]
    pub fn has_uncommitted(&self) -> bool {
        self.entries.last().is_some_and(|entry| entry.uncommitted)
    }

    /// Applies every committed entry, starting from the empty message.
    pub fn replay(&self, limits: &CodecLimits) -> Result<Replayed> {
        let mut state = Vec::new();
        let mut committed = 0;
        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.uncommitted {
                if idx + 1 < self.entries.len() {
                    bail!("entry {idx} is marked uncommitted but is not the last entry");
                }
                break;
            }
            let delta =
                decode_delta(&entry.data).with_context(|| format!("decode entry {idx}"))?;
            state = apply_delta(&state, &delta, limits)
                .with_context(|| format!("apply entry {idx}"))?;
            committed = idx + 1;
        }
        debug!(entries = self.entries.len(), committed, "replayed changelog");
        Ok(Replayed { state, committed })
    }

    /// Brings the changelog up to date with `current`.
    ///
    /// Any stale uncommitted entry is replaced by a fresh one describing the
    /// change from the committed state, or dropped when nothing changed.
    pub fn update(
        &self,
        current: &[u8],
        descriptor: &dyn MessageDescriptor,
        extensions: &ExtensionRegistry,
        limits: &CodecLimits,
    ) -> Result<ChangelogUpdate> {
        let replayed = self.replay(limits)?;
        let delta = compute_delta(&replayed.state, current, descriptor, extensions, limits)
            .context("compute changelog delta")?;

        let mut entries = self.entries[..replayed.committed].to_vec();
        match delta {
            Some(delta) => entries.push(ChangeEntry {
                data: encode_delta(&delta),
                uncommitted: true,
            }),
            None if self.has_uncommitted() => {
                warn!("dropping stale uncommitted entry");
            }
            None => {}
        }
        let updated = Self { entries };
        if updated == *self {
            Ok(ChangelogUpdate::Unchanged)
        } else {
            Ok(ChangelogUpdate::Rewritten(updated))
        }
    }

    /// Marks the trailing uncommitted entry as committed.
    ///
    /// Returns `false` if there was nothing to commit.
    pub fn commit(&mut self) -> bool {
        match self.entries.last_mut() {
            Some(entry) if entry.uncommitted => {
                entry.uncommitted = false;
                true
            }
            _ => false,
        }
    }
}

/// Returns the changelog path for a `.proto` file path under `out_dir`.
///
/// `foo/bar.proto` maps to `<out_dir>/foo/bar.changes.json`.
#[must_use]
pub fn changelog_path(out_dir: &Path, proto_path: &str) -> PathBuf {
    let stem = proto_path.strip_suffix(".proto").unwrap_or(proto_path);
    out_dir.join(format!("{stem}.{CHANGELOG_EXTENSION}"))
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Engine;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
