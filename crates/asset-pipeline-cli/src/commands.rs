//! Subcommand implementations.

use crate::config::CliConfig;
use anyhow::{bail, Context, Result};
use asset_pipeline_builder::{
    build, plan_previous_publish_locks, AssetInfo, BuildContext, BuildRequest, DocumentProvider,
    JsonDocumentProvider, LockReport, PreviousPublish, ProductionConfig, TaskLayerLockPlan,
};
use asset_pipeline_core::TaskLayerAssembly;
use asset_pipeline_metadata::records::TIME_FORMAT;
use asset_pipeline_metadata::{load_metadata, write_metadata, AssetDir, AssetPublish, MetadataTreeAsset};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Inputs of a push.
#[derive(Debug, Clone)]
pub struct PushOptions {
    /// Production configuration file
    pub config: PathBuf,
    /// Asset directory holding the task file and `publish/`
    pub asset_dir: PathBuf,
    /// Task document to push
    pub task: PathBuf,
    /// Asset name
    pub asset_name: String,
    /// Asset type
    pub asset_type: Option<String>,
    /// Ids of the task layers to push
    pub layers: Vec<String>,
}

/// What a push wrote.
#[derive(Debug, Clone)]
pub struct PushSummary {
    /// New publish document
    pub publish_path: PathBuf,
    /// Its metadata sidecar
    pub metadata_path: PathBuf,
    /// Whether this was the first publish of the asset
    pub first_publish: bool,
    /// Earlier sidecars that had layers locked
    pub relocked: Vec<PathBuf>,
}

/// Human readable listing of a metadata tree.
#[must_use]
pub fn render_metadata(tree: &MetadataTreeAsset) -> String {
    let asset = &tree.asset;
    let mut out = String::new();
    let _ = writeln!(out, "{} {} [{}]", asset.name, asset.version, asset.status);
    if !asset.parent_name.is_empty() {
        let _ = writeln!(out, "  type:    {}", asset.parent_name);
    }
    let _ = writeln!(out, "  id:      {}", asset.id);
    let _ = writeln!(out, "  project: {}", asset.project_id);
    for layer in &tree.task_layers {
        let state = if layer.is_locked { "locked" } else { "live" };
        let _ = writeln!(
            out,
            "  {:<12} {:<6} {} @ {} {} ({})",
            layer.id,
            state,
            layer.author.full_name,
            layer.hostname,
            layer.updated_at.format(TIME_FORMAT),
            layer.source_path.display(),
        );
    }
    out
}

/// Load a metadata sidecar.
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed.
pub fn inspect(path: &Path) -> Result<MetadataTreeAsset> {
    load_metadata(path).with_context(|| format!("Failed to load metadata {}", path.display()))
}

/// Lock `ids` in the sidecar at `path`.
///
/// # Errors
///
/// Returns error if the sidecar cannot be loaded or written.
pub fn lock(path: &Path, ids: &[String]) -> Result<LockReport> {
    let plan = TaskLayerLockPlan::new(ids.iter().cloned());
    plan.lock_and_persist(path)
        .with_context(|| format!("Failed to lock task layers in {}", path.display()))
}

/// Assemble the layers of a production configuration.
///
/// # Errors
///
/// Returns error if the configuration cannot be loaded or assembled.
pub fn load_assembly(path: &Path) -> Result<(ProductionConfig, TaskLayerAssembly)> {
    let production = ProductionConfig::from_path(path)?;
    let assembly = production
        .assembly()
        .with_context(|| format!("Invalid production config {}", path.display()))?;
    Ok((production, assembly))
}

/// One line per layer, in merge order.
#[must_use]
pub fn render_assembly(assembly: &TaskLayerAssembly) -> String {
    let mut out = String::new();
    for layer in assembly.layers() {
        let _ = writeln!(
            out,
            "{:>3}  {:<16} {:<16} {}",
            layer.order(),
            layer.id(),
            layer.name(),
            layer.task_suffix()
        );
    }
    out
}

/// Merge the task file into the latest publish of the asset directory and
/// write the next publish with its sidecar.
///
/// Earlier publishes get the pushed layers locked afterwards. Earlier
/// sidecars that cannot be read are skipped with a warning.
///
/// # Errors
///
/// Returns error if any input cannot be loaded, the build fails, the next
/// publish or its sidecar already exists, or the new publish cannot be
/// written.
pub fn push(options: &PushOptions, config: &CliConfig) -> Result<PushSummary> {
    if options.asset_name.is_empty() {
        bail!("Asset name must not be empty");
    }
    let (production, assembly) = load_assembly(&options.config)?;

    let mut asset = AssetInfo::new(&options.asset_name);
    if let Some(asset_type) = &options.asset_type {
        asset = asset.with_asset_type(asset_type);
    }
    let mut context = BuildContext::new(assembly, asset)
        .with_settings(production.transfer_settings.clone())
        .with_environment(config.to_environment());
    context.select_layers(&options.layers)?;

    let provider = JsonDocumentProvider;
    let task = provider
        .load(&options.task)
        .with_context(|| format!("Failed to load task {}", options.task.display()))?;
    let task_source_path = options
        .task
        .strip_prefix(&options.asset_dir)
        .unwrap_or(&options.task)
        .to_path_buf();

    let asset_dir = AssetDir::new(&options.asset_dir, provider.extension());
    let publishes = asset_dir
        .publishes()
        .with_context(|| format!("Failed to list publishes of {}", options.asset_dir.display()))?;
    let publish_path = asset_dir.next_publish_path()?;
    let metadata_path = AssetPublish::from_path(&publish_path)
        .with_context(|| format!("Not a publish path: {}", publish_path.display()))?
        .metadata_path();
    for existing in [&publish_path, &metadata_path] {
        if existing.exists() {
            bail!("Refusing to overwrite existing publish file {}", existing.display());
        }
    }

    let request = match publishes.last() {
        None => {
            tracing::info!(asset = %options.asset_name, "Creating first publish");
            BuildRequest::first_publish(task, task_source_path)
        }
        Some(latest) => {
            tracing::info!(
                asset = %options.asset_name,
                from = %latest.version_string(),
                layers = ?context.pushed_layer_ids(),
                "Pushing task layers"
            );
            let previous = PreviousPublish {
                document: provider.load(latest.path())?,
                metadata: load_metadata(&latest.metadata_path())?,
            };
            BuildRequest::push(task, task_source_path, previous)
        }
    };

    let outcome = build(&context, request)?;
    provider.save(&publish_path, &outcome.document)?;
    write_metadata(&metadata_path, &outcome.metadata)?;

    let earlier: Vec<_> = publishes
        .iter()
        .filter_map(|publish| {
            let path = publish.metadata_path();
            match load_metadata(&path) {
                Ok(tree) => Some((path, tree)),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "Skipping unreadable metadata of earlier publish");
                    None
                }
            }
        })
        .collect();
    let pushed: BTreeSet<String> = context.pushed_layer_ids().into_iter().collect();
    let mut relocked = Vec::new();
    for plan in plan_previous_publish_locks(&pushed, &earlier) {
        let report = plan.plan.lock_and_persist(&plan.metadata_path)?;
        if report.changed() {
            relocked.push(plan.metadata_path);
        }
    }

    tracing::info!(
        path = %publish_path.display(),
        version = %outcome.metadata.asset.version,
        relocked = relocked.len(),
        "Published"
    );
    Ok(PushSummary {
        publish_path,
        metadata_path,
        first_publish: outcome.first_publish,
        relocked,
    })
}
