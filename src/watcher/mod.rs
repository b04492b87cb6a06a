use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use crate::AppState;

/// TemplateWatcher reloads the registry when files in the template directory change
pub struct TemplateWatcher {
    state: Arc<AppState>,
    dir: PathBuf,
    debounce: Duration,
    stop_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TemplateWatcher {
    pub fn new(state: Arc<AppState>, dir: impl Into<PathBuf>, debounce: Duration) -> Self {
        Self {
            state,
            dir: dir.into(),
            debounce,
            stop_tx: None,
        }
    }

    /// Start watching the template directory
    pub fn start(&mut self) -> Result<()> {
        // Capacity 1: a pending signal already means "reload soon"
        let (event_tx, mut event_rx) = mpsc::channel::<()>(1);

        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) if is_template_change(&event) => {
                    tracing::debug!("Template change: {:?} {:?}", event.kind, event.paths);
                    let _ = event_tx.try_send(());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Template watch error: {}", e),
            })
            .context("Failed to create template watcher")?;

        watcher
            .watch(&self.dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", self.dir.display()))?;

        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel();
        self.stop_tx = Some(stop_tx);

        let state = self.state.clone();
        let debounce = self.debounce;
        tracing::info!("Watching {} for template changes", self.dir.display());

        tokio::spawn(async move {
            // Keep the watcher alive for as long as the task runs
            let _watcher = watcher;

            loop {
                tokio::select! {
                    signal = event_rx.recv() => {
                        if signal.is_none() {
                            break;
                        }
                        // Let editors finish writing before reading the directory
                        sleep(debounce).await;
                        while event_rx.try_recv().is_ok() {}

                        match state.trigger_reload().await {
                            Ok(summary) => tracing::info!(
                                "Templates reloaded after file change (generation {})",
                                summary.generation
                            ),
                            Err(e) => tracing::warn!("Template reload after file change rejected: {}", e),
                        }
                    }
                    _ = &mut stop_rx => {
                        tracing::info!("Template watcher stopped");
                        break;
                    }
                }
            }
        });

        Ok(())
    }

    /// Stop watching the template directory
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Whether an event touches a file the loader reads
fn is_template_change(event: &Event) -> bool {
    let relevant_kind = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    relevant_kind
        && event.paths.iter().any(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("json") | Some("php")
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_template_changes_detected() {
        assert!(is_template_change(&event(EventKind::Create(CreateKind::File), "/t/iol.php")));
        assert!(is_template_change(&event(EventKind::Modify(ModifyKind::Any), "/t/vios.json")));
        assert!(is_template_change(&event(EventKind::Remove(RemoveKind::File), "/t/iol.php")));
    }

    #[test]
    fn test_irrelevant_events_ignored() {
        assert!(!is_template_change(&event(EventKind::Access(AccessKind::Any), "/t/iol.php")));
        assert!(!is_template_change(&event(EventKind::Modify(ModifyKind::Any), "/t/iol.php.swp")));
        assert!(!is_template_change(&event(EventKind::Create(CreateKind::File), "/t/README")));
    }
}
