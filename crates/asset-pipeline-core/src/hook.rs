//! Rule-matched callbacks dispatched after a merge.
//!
//! Each [`Hook`] declares a [`MatchCriteria`] per axis (asset type, asset
//! name, task layer). A build dispatches in five phases, each supplying a
//! different subset of the axes; a hook fires in a phase only when every
//! one of its criteria accepts the value, or absence of value, supplied
//! for that axis.

use crate::graph::{Document, GraphError, GroupId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Criterion for one dispatch axis.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MatchCriteria {
    /// Matches exactly this value.
    Exact(String),
    /// Matches any value in the set.
    AnyOf(BTreeSet<String>),
    /// Matches any value, and absence of a value.
    Any,
    /// Matches only when no value is supplied.
    #[default]
    Unset,
}

impl MatchCriteria {
    /// Criterion matching any of `values`.
    pub fn any_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AnyOf(values.into_iter().map(Into::into).collect())
    }

    /// Whether the criterion accepts the supplied value.
    #[must_use]
    pub fn matches(&self, value: Option<&str>) -> bool {
        match self {
            MatchCriteria::Exact(expected) => value == Some(expected.as_str()),
            MatchCriteria::AnyOf(set) => value.is_some_and(|value| set.contains(value)),
            MatchCriteria::Any => true,
            MatchCriteria::Unset => value.is_none(),
        }
    }
}

impl From<&str> for MatchCriteria {
    fn from(value: &str) -> Self {
        MatchCriteria::Exact(value.to_string())
    }
}

impl From<String> for MatchCriteria {
    fn from(value: String) -> Self {
        MatchCriteria::Exact(value)
    }
}

/// Error returned by a hook callback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    /// Callback-specific failure.
    #[error("{0}")]
    Failed(String),
    /// A graph mutation made by the callback failed.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// A hook failure, attributed to the hook and phase that raised it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("hook `{hook}` failed in {phase} phase")]
pub struct HookFailure {
    /// Name of the failing hook
    pub hook: String,
    /// Phase being dispatched
    pub phase: HookPhase,
    /// Error returned by the callback
    #[source]
    pub source: HookError,
}

/// One of the five dispatch phases, in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    /// No axis supplied
    Global,
    /// Asset type only
    AssetType,
    /// Task layer only, once per enabled layer
    TaskLayer,
    /// Asset name only
    AssetName,
    /// Asset name and task layer, once per enabled layer
    AssetNameTaskLayer,
}

impl std::fmt::Display for HookPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookPhase::Global => write!(f, "global"),
            HookPhase::AssetType => write!(f, "asset type"),
            HookPhase::TaskLayer => write!(f, "task layer"),
            HookPhase::AssetName => write!(f, "asset name"),
            HookPhase::AssetNameTaskLayer => write!(f, "asset name + task layer"),
        }
    }
}

/// Values supplied for each axis by a dispatch phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HookQuery<'a> {
    /// Asset type axis
    pub asset_type: Option<&'a str>,
    /// Asset name axis
    pub asset_name: Option<&'a str>,
    /// Task layer axis
    pub task_layer: Option<&'a str>,
}

/// State handed to a firing hook.
pub struct HookContext<'a> {
    /// The merged document
    pub document: &'a mut Document,
    /// Root group of the merged asset
    pub asset_root: GroupId,
    /// Phase being dispatched
    pub phase: HookPhase,
    /// Axis values of the phase
    pub query: HookQuery<'a>,
}

type HookFn = dyn Fn(&mut HookContext<'_>) -> Result<(), HookError> + Send + Sync;

/// A named callback with match criteria.
#[derive(Clone)]
pub struct Hook {
    name: String,
    asset_type: MatchCriteria,
    asset_name: MatchCriteria,
    task_layers: MatchCriteria,
    callback: Arc<HookFn>,
}

impl Hook {
    /// Create a hook that only matches the global phase.
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&mut HookContext<'_>) -> Result<(), HookError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            asset_type: MatchCriteria::Unset,
            asset_name: MatchCriteria::Unset,
            task_layers: MatchCriteria::Unset,
            callback: Arc::new(callback),
        }
    }

    /// Builder-style asset type criterion.
    #[must_use]
    pub fn match_asset_type(mut self, criteria: impl Into<MatchCriteria>) -> Self {
        self.asset_type = criteria.into();
        self
    }

    /// Builder-style asset name criterion.
    #[must_use]
    pub fn match_asset_name(mut self, criteria: impl Into<MatchCriteria>) -> Self {
        self.asset_name = criteria.into();
        self
    }

    /// Builder-style task layer criterion.
    #[must_use]
    pub fn match_task_layers(mut self, criteria: impl Into<MatchCriteria>) -> Self {
        self.task_layers = criteria.into();
        self
    }

    /// Hook name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether every criterion accepts the query.
    #[must_use]
    pub fn matches(&self, query: &HookQuery<'_>) -> bool {
        self.asset_type.matches(query.asset_type)
            && self.asset_name.matches(query.asset_name)
            && self.task_layers.matches(query.task_layer)
    }
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("asset_type", &self.asset_type)
            .field("asset_name", &self.asset_name)
            .field("task_layers", &self.task_layers)
            .finish_non_exhaustive()
    }
}

/// Record of a hook that fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookInvocation {
    /// Hook name
    pub hook: String,
    /// Phase it fired in
    pub phase: HookPhase,
    /// Task layer supplied by the phase, if any
    pub task_layer: Option<String>,
}

/// The hooks registered for a production.
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    hooks: Vec<Hook>,
}

impl HookRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook. Hooks fire in registration order within a phase.
    pub fn register(&mut self, hook: Hook) {
        tracing::debug!(hook = %hook.name, "Registered hook");
        self.hooks.push(hook);
    }

    /// Number of registered hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hooks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Hooks matching `query`, in registration order.
    pub fn filter<'a>(&'a self, query: &'a HookQuery<'a>) -> impl Iterator<Item = &'a Hook> + 'a {
        self.hooks.iter().filter(move |hook| hook.matches(query))
    }

    /// The phase queries of a build, in dispatch order.
    ///
    /// The asset type phase is omitted when no asset type is known, since
    /// its query would repeat the global one.
    #[must_use]
    pub fn phases<'a>(
        asset_type: Option<&'a str>,
        asset_name: &'a str,
        task_layers: &'a [String],
    ) -> Vec<(HookPhase, HookQuery<'a>)> {
        let mut phases = vec![(HookPhase::Global, HookQuery::default())];
        if asset_type.is_some() {
            phases.push((
                HookPhase::AssetType,
                HookQuery {
                    asset_type,
                    ..HookQuery::default()
                },
            ));
        }
        for layer in task_layers {
            phases.push((
                HookPhase::TaskLayer,
                HookQuery {
                    task_layer: Some(layer.as_str()),
                    ..HookQuery::default()
                },
            ));
        }
        phases.push((
            HookPhase::AssetName,
            HookQuery {
                asset_name: Some(asset_name),
                ..HookQuery::default()
            },
        ));
        for layer in task_layers {
            phases.push((
                HookPhase::AssetNameTaskLayer,
                HookQuery {
                    asset_name: Some(asset_name),
                    task_layer: Some(layer.as_str()),
                    ..HookQuery::default()
                },
            ));
        }
        phases
    }

    /// Run every phase against `document`, calling matching hooks.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first hook failure.
    pub fn dispatch(
        &self,
        document: &mut Document,
        asset_root: GroupId,
        asset_type: Option<&str>,
        asset_name: &str,
        task_layers: &[String],
    ) -> Result<Vec<HookInvocation>, HookFailure> {
        let mut invoked = Vec::new();
        for (phase, query) in Self::phases(asset_type, asset_name, task_layers) {
            for hook in self.hooks.iter().filter(|hook| hook.matches(&query)) {
                let mut ctx = HookContext {
                    document: &mut *document,
                    asset_root,
                    phase,
                    query,
                };
                if let Err(source) = (hook.callback)(&mut ctx) {
                    tracing::error!(hook = %hook.name, %phase, error = %source, "Hook failed");
                    return Err(HookFailure {
                        hook: hook.name.clone(),
                        phase,
                        source,
                    });
                }
                tracing::debug!(hook = %hook.name, %phase, task_layer = ?query.task_layer, "Ran hook");
                invoked.push(HookInvocation {
                    hook: hook.name.clone(),
                    phase,
                    task_layer: query.task_layer.map(str::to_string),
                });
            }
        }
        Ok(invoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop(_: &mut HookContext<'_>) -> Result<(), HookError> {
        Ok(())
    }

    fn layers() -> Vec<String> {
        vec!["Rigging".to_string(), "Shading".to_string()]
    }

    fn phases_of(invoked: &[HookInvocation], hook: &str) -> Vec<(HookPhase, Option<String>)> {
        invoked
            .iter()
            .filter(|invocation| invocation.hook == hook)
            .map(|invocation| (invocation.phase, invocation.task_layer.clone()))
            .collect()
    }

    #[test]
    fn test_criteria_matching() {
        assert!(MatchCriteria::Unset.matches(None));
        assert!(!MatchCriteria::Unset.matches(Some("char")));
        assert!(MatchCriteria::Any.matches(None));
        assert!(MatchCriteria::Any.matches(Some("char")));
        assert!(MatchCriteria::from("char").matches(Some("char")));
        assert!(!MatchCriteria::from("char").matches(None));
        let any_of = MatchCriteria::any_of(["char", "prop"]);
        assert!(any_of.matches(Some("prop")));
        assert!(!any_of.matches(Some("set")));
        assert!(!any_of.matches(None));
    }

    #[test]
    fn test_unfiltered_hook_fires_once_globally() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let mut registry = HookRegistry::new();
        registry.register(Hook::new("cleanup", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        let mut doc = Document::default();
        let root = doc.scene();

        let invoked = registry
            .dispatch(&mut doc, root, Some("char"), "einar", &layers())
            .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(phases_of(&invoked, "cleanup"), vec![(HookPhase::Global, None)]);
    }

    #[test]
    fn test_axis_filters_select_phases() {
        let mut registry = HookRegistry::new();
        registry.register(Hook::new("per-type", noop).match_asset_type("char"));
        registry.register(Hook::new("per-layer", noop).match_task_layers(MatchCriteria::Any));
        registry.register(
            Hook::new("einar-shading", noop)
                .match_asset_name("einar")
                .match_task_layers("Shading"),
        );
        registry.register(Hook::new("other-asset", noop).match_asset_name("mira"));
        let mut doc = Document::default();
        let root = doc.scene();

        let invoked = registry
            .dispatch(&mut doc, root, Some("char"), "einar", &layers())
            .unwrap();

        assert_eq!(phases_of(&invoked, "per-type"), vec![(HookPhase::AssetType, None)]);
        assert_eq!(
            phases_of(&invoked, "per-layer"),
            vec![
                (HookPhase::Global, None),
                (HookPhase::TaskLayer, Some("Rigging".to_string())),
                (HookPhase::TaskLayer, Some("Shading".to_string())),
            ]
        );
        assert_eq!(
            phases_of(&invoked, "einar-shading"),
            vec![(HookPhase::AssetNameTaskLayer, Some("Shading".to_string()))]
        );
        assert!(phases_of(&invoked, "other-asset").is_empty());
    }

    #[test]
    fn test_failure_stops_dispatch() {
        let mut registry = HookRegistry::new();
        registry.register(Hook::new("broken", |_| Err(HookError::Failed("boom".into()))));
        registry.register(Hook::new("after", noop));
        let mut doc = Document::default();
        let root = doc.scene();

        let failure = registry
            .dispatch(&mut doc, root, None, "einar", &[])
            .unwrap_err();

        assert_eq!(failure.hook, "broken");
        assert_eq!(failure.phase, HookPhase::Global);
    }

    #[test]
    fn test_hooks_can_edit_document() {
        let mut registry = HookRegistry::new();
        registry.register(Hook::new("tag", |ctx| {
            let group = ctx.document.add_group("hooked");
            ctx.document.link_child(ctx.asset_root, group)?;
            Ok(())
        }));
        let mut doc = Document::default();
        let root = doc.scene();

        registry.dispatch(&mut doc, root, None, "einar", &[]).unwrap();

        assert!(doc.find_child_by_name(root, "hooked").is_some());
    }
}
