//! In-memory template registry with all-or-nothing reloads.
//!
//! The registry serves one immutable [`Snapshot`] at a time. A load builds and
//! validates a complete replacement off to the side and only then swaps the
//! pointer, so readers see either the old or the new set, never a mix.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;

use crate::models::{DeviceTemplate, RawTemplate, TemplateEntry};
use crate::validator::{self, FieldError};

/// Lifecycle state of the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryState {
    Empty,
    Loading,
    Ready,
}

/// Why a single source was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "errors", rename_all = "snake_case")]
pub enum SourceError {
    #[error("identifier appears more than once in the batch")]
    DuplicateIdentifier,

    #[error("{} field error(s): {}", .0.len(), join_errors(.0))]
    Invalid(Vec<FieldError>),
}

fn join_errors(errors: &[FieldError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
}

/// A rejected source in a load batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub id: String,
    pub error: SourceError,
}

/// Returned when any source in a batch fails; the previous snapshot is kept
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("load aborted: {} of {total} template source(s) rejected, previous templates retained", .failures.len())]
pub struct LoadAborted {
    pub failures: Vec<SourceFailure>,
    pub total: usize,
}

/// Outcome of a committed load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub loaded: usize,
    pub generation: u64,
}

/// Immutable point-in-time view of every registered template
#[derive(Debug)]
pub struct Snapshot {
    templates: BTreeMap<String, Arc<DeviceTemplate>>,
    generation: u64,
    loaded_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            templates: BTreeMap::new(),
            generation: 0,
            loaded_at: None,
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<DeviceTemplate>> {
        self.templates.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Number of successful loads that produced this snapshot; 0 before the first
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    /// Templates in identifier order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<DeviceTemplate>)> {
        self.templates.iter().map(|(id, t)| (id.as_str(), t))
    }
}

/// Restartable listing over the snapshot that was current when it was taken
#[derive(Debug, Clone)]
pub struct Listing {
    snapshot: Arc<Snapshot>,
}

impl Listing {
    pub fn iter(&self) -> impl Iterator<Item = &Arc<DeviceTemplate>> {
        self.snapshot.templates.values()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Arc<DeviceTemplate>)> {
        self.snapshot.iter()
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.snapshot.generation
    }

    /// Owned entries for API responses
    pub fn to_entries(&self) -> Vec<TemplateEntry> {
        self.entries()
            .map(|(id, t)| TemplateEntry {
                id: id.to_string(),
                template: DeviceTemplate::clone(t),
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a Listing {
    type Item = &'a Arc<DeviceTemplate>;
    type IntoIter = std::collections::btree_map::Values<'a, String, Arc<DeviceTemplate>>;

    fn into_iter(self) -> Self::IntoIter {
        self.snapshot.templates.values()
    }
}

/// TemplateRegistry maps template identifiers to validated templates
pub struct TemplateRegistry {
    current: RwLock<Arc<Snapshot>>,
    state: RwLock<RegistryState>,
    // Serializes loads so two reloads never interleave
    writer: Mutex<()>,
    // Held across fetch + load so a slow fetch cannot commit after a newer one
    reloads: tokio::sync::Mutex<()>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::empty())),
            state: RwLock::new(RegistryState::Empty),
            writer: Mutex::new(()),
            reloads: tokio::sync::Mutex::new(()),
        }
    }

    /// Current snapshot. The read lock is held only to clone the pointer.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn get(&self, id: &str) -> Option<Arc<DeviceTemplate>> {
        self.snapshot().get(id)
    }

    pub fn list(&self) -> Listing {
        Listing {
            snapshot: self.snapshot(),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn state(&self) -> RegistryState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: RegistryState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Exclusive reload slot. A caller that fetches its batch before calling
    /// [`TemplateRegistry::load`] holds this for the whole fetch, so reloads
    /// commit in the order they started.
    pub async fn reload_guard(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.reloads.lock().await
    }

    /// Validate a whole batch and commit it atomically.
    ///
    /// Every source is checked even after a failure so the caller gets the
    /// complete report. On any failure nothing changes.
    pub fn load<I>(&self, sources: I) -> Result<LoadSummary, LoadAborted>
    where
        I: IntoIterator<Item = (String, RawTemplate)>,
    {
        let _writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let previous = self.state();
        self.set_state(RegistryState::Loading);

        let sources: Vec<(String, RawTemplate)> = sources.into_iter().collect();
        let total = sources.len();

        let mut seen: HashMap<&str, usize> = HashMap::new();
        for (id, _) in &sources {
            *seen.entry(id.as_str()).or_default() += 1;
        }

        let mut failures = Vec::new();
        let mut templates = BTreeMap::new();
        for (id, raw) in &sources {
            if seen.get(id.as_str()).copied().unwrap_or_default() > 1 {
                // Report each duplicated identifier once
                if !failures.iter().any(|f: &SourceFailure| &f.id == id) {
                    failures.push(SourceFailure {
                        id: id.clone(),
                        error: SourceError::DuplicateIdentifier,
                    });
                }
                continue;
            }

            match validator::validate_report(raw) {
                Ok(validated) => {
                    for warning in &validated.warnings {
                        tracing::debug!("Template {}: {:?}", id, warning);
                    }
                    templates.insert(id.clone(), Arc::new(validated.template));
                }
                Err(errors) => failures.push(SourceFailure {
                    id: id.clone(),
                    error: SourceError::Invalid(errors),
                }),
            }
        }

        if !failures.is_empty() {
            self.set_state(previous);
            let aborted = LoadAborted { failures, total };
            tracing::warn!("{}", aborted);
            for failure in &aborted.failures {
                tracing::warn!("  {}: {}", failure.id, failure.error);
            }
            return Err(aborted);
        }

        let generation = self.snapshot().generation + 1;
        let next = Arc::new(Snapshot {
            templates,
            generation,
            loaded_at: Some(Utc::now()),
        });
        let loaded = next.len();

        *self.current.write().unwrap_or_else(|e| e.into_inner()) = next;
        self.set_state(RegistryState::Ready);

        tracing::info!("Loaded {} device templates (generation {})", loaded, generation);
        Ok(LoadSummary { loaded, generation })
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}
