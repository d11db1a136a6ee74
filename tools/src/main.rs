use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use codec::{
    apply_delta, compute_delta_with_strategy, decode_delta, encode_delta, CodecLimits,
    EncodingStrategy,
};
use glob::Pattern;
use pbdelta_tools::{
    changelog_path, descriptor_pool, file_descriptor_descriptor, format_report_pretty, Changelog,
    ChangelogUpdate, DeltaReport, DescriptorSet,
};
use schema::{ExtensionRegistry, MessageDef, SchemaPool};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pbdelta-tools",
    version,
    about = "pbdelta changelog, diff and inspection tools"
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Update per-file descriptor changelogs from a descriptor set.
    Changes {
        /// Encoded FileDescriptorSet (protoc --include_imports --descriptor_set_out).
        descriptor_set: PathBuf,
        /// Directory the changelogs are written under.
        #[arg(long)]
        out_dir: PathBuf,
        /// Only process files whose proto path matches this glob. Without it,
        /// every file except `google/protobuf/*` is processed.
        #[arg(long)]
        glob: Option<String>,
        /// Commit the trailing uncommitted entry after updating.
        #[arg(long)]
        commit: bool,
    },
    /// Compute the delta between two encoded messages.
    Diff {
        /// Encoded FileDescriptorSet declaring the message.
        #[arg(long, required_unless_present = "schema", conflicts_with = "schema")]
        descriptor_set: Option<PathBuf>,
        /// Schema JSON (a list of message definitions) declaring the message.
        #[arg(long)]
        schema: Option<PathBuf>,
        /// Fully-qualified message name.
        #[arg(long)]
        message: String,
        /// Path to the old message bytes.
        old: PathBuf,
        /// Path to the new message bytes.
        new: PathBuf,
        /// Always emit a field-level delta.
        #[arg(long)]
        field_level: bool,
        /// Write the encoded delta record here.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Report format.
        #[arg(long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
    },
    /// Apply an encoded delta record to a base message.
    Apply {
        /// Path to the base message bytes.
        base: PathBuf,
        /// Path to the encoded delta record.
        delta: PathBuf,
        /// Write the patched message here.
        #[arg(long)]
        out: PathBuf,
    },
    /// Describe an encoded delta record.
    Inspect {
        /// Path to the encoded delta record.
        delta: PathBuf,
        /// Report format.
        #[arg(long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Json,
    Pretty,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let limits = CodecLimits::default();
    match cli.command {
        Command::Changes {
            descriptor_set,
            out_dir,
            glob,
            commit,
        } => run_changes(&descriptor_set, &out_dir, glob.as_deref(), commit, &limits)?,
        Command::Diff {
            descriptor_set,
            schema,
            message,
            old,
            new,
            field_level,
            out,
            format,
        } => {
            let (pool, extensions) = match (descriptor_set, schema) {
                (Some(path), _) => {
                    let set = load_descriptor_set(&path, &limits)?;
                    let pool = set.pool()?;
                    let extensions = set.extensions(&pool)?;
                    (pool, extensions)
                }
                (None, Some(path)) => (load_schema(&path)?, ExtensionRegistry::empty()),
                (None, None) => bail!("either --descriptor-set or --schema is required"),
            };
            let descriptor = pool
                .descriptor(&message)
                .with_context(|| format!("message {message} not found in schema"))?;
            let old = read(&old, "old message")?;
            let new = read(&new, "new message")?;
            let strategy = if field_level {
                EncodingStrategy::FieldLevel
            } else {
                EncodingStrategy::Smallest
            };
            let delta = compute_delta_with_strategy(
                &old,
                &new,
                descriptor.as_ref(),
                &extensions,
                &limits,
                strategy,
            )
            .context("compute delta")?;
            let Some(delta) = delta else {
                info!("messages are identical");
                if let Some(out) = &out {
                    // An empty record applies as the identity.
                    write(out, &[], "delta")?;
                }
                return Ok(());
            };
            if let Some(out) = &out {
                write(out, &encode_delta(&delta), "delta")?;
            }
            print_report(&DeltaReport::new(&delta), format)?;
        }
        Command::Apply { base, delta, out } => {
            let base = read(&base, "base message")?;
            let delta = decode_delta(&read(&delta, "delta")?).context("decode delta")?;
            let patched = apply_delta(&base, &delta, &limits).context("apply delta")?;
            write(&out, &patched, "patched message")?;
        }
        Command::Inspect { delta, format } => {
            let delta = decode_delta(&read(&delta, "delta")?).context("decode delta")?;
            print_report(&DeltaReport::new(&delta), format)?;
        }
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_changes(
    descriptor_set: &Path,
    out_dir: &Path,
    glob: Option<&str>,
    commit: bool,
    limits: &CodecLimits,
) -> Result<()> {
    let set = load_descriptor_set(descriptor_set, limits)?;
    let pool = set.pool()?;
    let extensions = set.extensions(&pool)?;
    let descriptors = descriptor_pool()?;
    let file_descriptor = file_descriptor_descriptor(&descriptors)?;
    let pattern = match glob {
        Some(value) => Some(Pattern::new(value).context("invalid glob pattern")?),
        None => None,
    };

    for file in set.targets(pattern.as_ref()) {
        let name = file.name();
        let path = changelog_path(out_dir, name);
        let changelog = Changelog::load(&path)?;
        let update = changelog
            .update(&file.state, file_descriptor.as_ref(), &extensions, limits)
            .with_context(|| format!("update changelog for {name}"))?;
        let (mut next, mut dirty) = match update {
            ChangelogUpdate::Unchanged => (changelog, false),
            ChangelogUpdate::Rewritten(next) => (next, true),
        };
        if commit && next.commit() {
            dirty = true;
        }
        if dirty {
            next.save(&path)?;
            info!(
                file = name,
                path = %path.display(),
                entries = next.entries.len(),
                "wrote changelog"
            );
        } else {
            info!(file = name, "changelog up to date");
        }
    }
    Ok(())
}

fn load_descriptor_set(path: &Path, limits: &CodecLimits) -> Result<DescriptorSet> {
    let bytes = read(path, "descriptor set")?;
    DescriptorSet::decode(&bytes, &limits.wire)
        .with_context(|| format!("decode descriptor set {}", path.display()))
}

fn load_schema(path: &Path) -> Result<Arc<SchemaPool>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read schema {}", path.display()))?;
    let defs: Vec<MessageDef> = serde_json::from_str(&contents).context("parse schema json")?;
    let pool = SchemaPool::new(defs).map_err(|err| anyhow!("schema validation failed: {err}"))?;
    Ok(Arc::new(pool))
}

fn read(path: &Path, what: &str) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("read {what} {}", path.display()))
}

fn write(path: &Path, bytes: &[u8], what: &str) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("write {what} {}", path.display()))?;
    info!(path = %path.display(), len = bytes.len(), "wrote {what}");
    Ok(())
}

fn print_report(report: &DeltaReport, format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let json = serde_json::to_string_pretty(report).context("serialize json")?;
            println!("{json}");
        }
        Format::Pretty => {
            print!("{}", format_report_pretty(report));
        }
    }
    Ok(())
}
