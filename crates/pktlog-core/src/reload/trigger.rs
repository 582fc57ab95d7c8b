//! Reload trigger sources: file changes and SIGHUP

use super::ReloadTrigger;
use crate::error::{Error, Result};
use notify::event::{EventKind, ModifyKind};
use notify::{RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Pending triggers beyond this are dropped; one queued trigger is enough
const TRIGGER_CAPACITY: usize = 4;

/// Watches a config file (and SIGHUP on Unix) for reload triggers
///
/// Watching stops when this is dropped.
pub struct FileWatcher {
    path: PathBuf,
    _watcher: notify::RecommendedWatcher,
    signal_task: Option<JoinHandle<()>>,
}

impl FileWatcher {
    /// Start watching `path`
    ///
    /// The parent directory is watched rather than the file itself, since
    /// editors often replace the file instead of writing it in place. Must be
    /// called inside a Tokio runtime.
    pub fn start(path: &Path) -> Result<(Self, mpsc::Receiver<ReloadTrigger>)> {
        let (tx, rx) = mpsc::channel(TRIGGER_CAPACITY);

        let path = path.to_path_buf();
        let file_name = path
            .file_name()
            .ok_or_else(|| Error::Watch(format!("{} has no file name", path.display())))?
            .to_os_string();
        let parent = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let event_tx = tx.clone();
        let event_path = path.clone();
        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    let is_write = is_content_change(&event.kind);
                    let is_ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if !is_write || !is_ours {
                        return;
                    }

                    debug!(path = %event_path.display(), "Config file changed");
                    // A full queue already holds a pending reload.
                    let _ = event_tx.try_send(ReloadTrigger::FileChanged(event_path.clone()));
                }
                Err(e) => warn!(error = %e, "Config file watcher error"),
            },
        )?;
        watcher.watch(&parent, RecursiveMode::NonRecursive)?;

        let signal_task = spawn_signal_listener(tx);

        info!(path = %path.display(), "Watching config file");
        Ok((
            Self {
                path,
                _watcher: watcher,
                signal_task,
            },
            rx,
        ))
    }

    /// Watched config file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whether an event may have changed the file's contents
///
/// Backends differ in how precisely they tag a write; Windows reports
/// in-place edits as `Modify(Any)`. Metadata-only changes are ignored.
fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) => true,
        EventKind::Modify(modify) => !matches!(modify, ModifyKind::Metadata(_)),
        _ => false,
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        if let Some(task) = self.signal_task.take() {
            task.abort();
        }
    }
}

#[cfg(unix)]
fn spawn_signal_listener(tx: mpsc::Sender<ReloadTrigger>) -> Option<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!(error = %e, "Failed to install SIGHUP handler");
            return None;
        }
    };

    Some(tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("SIGHUP received, reloading config");
            if tx.send(ReloadTrigger::Signal).await.is_err() {
                break;
            }
        }
    }))
}

#[cfg(not(unix))]
fn spawn_signal_listener(_tx: mpsc::Sender<ReloadTrigger>) -> Option<JoinHandle<()>> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_write_triggers_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        let (watcher, mut rx) = FileWatcher::start(&path).unwrap();
        assert_eq!(watcher.path(), path.as_path());

        // Give the backend a moment to register the watch.
        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(&path, "[reload]\nconfig_auto_reload = true\n").unwrap();

        let trigger = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no trigger within timeout")
            .unwrap();
        assert_eq!(trigger, ReloadTrigger::FileChanged(path));
    }

    #[test]
    fn test_content_change_kinds() {
        use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind, RenameMode};

        assert!(is_content_change(&EventKind::Modify(ModifyKind::Any)));
        assert!(is_content_change(&EventKind::Modify(ModifyKind::Data(DataChange::Content))));
        assert!(is_content_change(&EventKind::Modify(ModifyKind::Name(RenameMode::To))));
        assert!(is_content_change(&EventKind::Create(CreateKind::File)));

        assert!(!is_content_change(&EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::AccessTime
        ))));
        assert!(!is_content_change(&EventKind::Access(AccessKind::Any)));
        assert!(!is_content_change(&EventKind::Remove(RemoveKind::File)));
    }

    #[tokio::test]
    async fn test_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("config.toml");
        assert!(FileWatcher::start(&path).is_err());
    }
}
