// src/watch/watcher.rs

use std::path::{Path, PathBuf};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{EngineEvent, TriggerSource};
use crate::errors::Result;
use crate::inventory;
use crate::watch::hash::ChangeHashCache;
use crate::watch::patterns::WatchProfile;

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive
/// for as long as needed. Dropping this handle will stop file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Spawn a filesystem watcher that observes the given `root` directory
/// recursively and turns matching changes into engine events:
///
/// - a change to the inventory file reloads the inventory,
/// - any other matching change requests a test run.
///
/// With `use_hash`, file contents are hashed and unchanged writes are
/// dropped instead of triggering.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    profile: WatchProfile,
    use_hash: bool,
    inventory_path: PathBuf,
    engine_tx: mpsc::Sender<EngineEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    // Canonicalize once so we have a stable base path.
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    let inventory_abs = if inventory_path.is_absolute() {
        inventory_path
    } else {
        root.join(inventory_path)
    };

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<Event>();

    // Closure called synchronously by notify whenever an event arrives.
    let mut watcher = RecommendedWatcher::new(
        {
            let event_tx = event_tx.clone();
            move |res: notify::Result<Event>| {
                match res {
                    Ok(event) => {
                        if let Err(err) = event_tx.send(event) {
                            // We can't log via tracing here easily, so fallback to stderr.
                            eprintln!("testwatch: failed to forward notify event: {err}");
                        }
                    }
                    Err(err) => {
                        eprintln!("testwatch: file watch error: {err}");
                    }
                }
            }
        },
        Config::default(),
    )
    .map_err(anyhow::Error::from)?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(anyhow::Error::from)?;

    info!("file watcher started on {:?}", root);

    // Async task that consumes notify events and forwards triggers to the
    // engine.
    tokio::spawn(async move {
        let mut hashes = ChangeHashCache::new();

        while let Some(event) = event_rx.recv().await {
            if !is_change_kind(&event.kind) {
                continue;
            }
            debug!(?event, "received notify event");

            for path in event.paths {
                let keep_going = process_changed_path(
                    &root,
                    &path,
                    &profile,
                    use_hash,
                    &inventory_abs,
                    &engine_tx,
                    &mut hashes,
                )
                .await;
                if !keep_going {
                    debug!("engine gone; stopping watcher loop");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}

/// Only content-affecting events matter; access notifications are noise.
fn is_change_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Handle one changed path. Returns false when the engine channel is gone.
async fn process_changed_path(
    root: &Path,
    path: &Path,
    profile: &WatchProfile,
    use_hash: bool,
    inventory_abs: &Path,
    engine_tx: &mpsc::Sender<EngineEvent>,
    hashes: &mut ChangeHashCache,
) -> bool {
    if paths_refer_to_same_file(path, inventory_abs) {
        return reload_inventory(inventory_abs, engine_tx).await;
    }

    let Ok(rel) = path.strip_prefix(root) else {
        return true;
    };
    let rel_str = rel.to_string_lossy().replace('\\', "/");
    if !profile.matches(&rel_str) {
        return true;
    }

    if use_hash {
        if path.is_file() {
            match hashes.content_changed(path) {
                Ok(false) => return true,
                Ok(true) => {}
                Err(err) => {
                    // File vanished between the event and the hash; treat
                    // as changed.
                    debug!(path = ?path, error = %err, "hashing failed; triggering anyway");
                }
            }
        } else {
            hashes.forget(path);
        }
    }

    debug!(path = ?path, "source change; requesting test run");
    if engine_tx
        .send(EngineEvent::RunRequested {
            trigger: TriggerSource::FileChange,
        })
        .await
        .is_err()
    {
        warn!("failed to send run request; engine receiver dropped");
        return false;
    }
    true
}

async fn reload_inventory(inventory_abs: &Path, engine_tx: &mpsc::Sender<EngineEvent>) -> bool {
    match inventory::load_inventory(inventory_abs) {
        Ok(inventory) => {
            info!(
                path = ?inventory_abs,
                tests = inventory.len(),
                "inventory file changed; reloading"
            );
            engine_tx
                .send(EngineEvent::InventoryReloaded { inventory })
                .await
                .is_ok()
        }
        Err(err) => {
            warn!(
                path = ?inventory_abs,
                error = %err,
                "inventory file changed but could not be loaded; keeping previous inventory"
            );
            true
        }
    }
}

fn paths_refer_to_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    // Symlinked temp dirs (notify reports resolved paths) still compare
    // equal after canonicalization.
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
