//! Rule file watcher for hot reload.
//!
//! Watches the directory containing the rule file rather than the file
//! itself, so editors that save by writing a new file and renaming it over
//! the old one keep being observed.

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// A change observed on the rule file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The file was written, created or renamed into place.
    Modified,
    /// The file was deleted or renamed away.
    Removed,
    /// The watch backend reported an error.
    Error(String),
}

/// The watch could not be established.
#[derive(Debug, thiserror::Error)]
#[error("cannot watch {}: {source}", path.display())]
pub struct WatchError {
    pub path: PathBuf,
    #[source]
    pub source: notify::Error,
}

/// An active subscription. Dropping it stops event delivery.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher").finish_non_exhaustive()
    }
}

impl ConfigWatcher {
    /// Start watching `path`.
    ///
    /// Returns the subscription and a receiver of change events. Events are
    /// produced on the notify backend thread. When `path` is a symlink the
    /// directory of the file it resolves to is watched as well.
    pub fn subscribe(path: &Path) -> Result<(Self, mpsc::UnboundedReceiver<WatchEvent>), WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let WatchTargets { dirs, names } = watch_targets(path);

        let to_error = |source| WatchError {
            path: path.to_path_buf(),
            source,
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if let Some(change) = classify(&event, &names) {
                        let _ = tx.send(change);
                    }
                }
                Err(e) => {
                    let _ = tx.send(WatchEvent::Error(e.to_string()));
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )
        .map_err(to_error)?;

        for dir in &dirs {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(to_error)?;
        }

        tracing::info!(
            path = %path.display(),
            directories = dirs.len(),
            "Rule file watcher started"
        );

        Ok((Self { _watcher: watcher }, rx))
    }
}

/// Directories to watch and the file names of interest within them.
#[derive(Debug, Default, PartialEq, Eq)]
struct WatchTargets {
    dirs: Vec<PathBuf>,
    names: Vec<OsString>,
}

impl WatchTargets {
    fn add(&mut self, path: &Path) {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !self.dirs.contains(&dir) {
            self.dirs.push(dir);
        }
        if let Some(name) = path.file_name() {
            if !self.names.iter().any(|n| n == name) {
                self.names.push(name.to_os_string());
            }
        }
    }
}

/// The path's own directory, plus the resolved file's directory when the
/// path is a symlink into another place.
fn watch_targets(path: &Path) -> WatchTargets {
    let mut targets = WatchTargets::default();
    targets.add(path);

    if let Ok(resolved) = std::fs::canonicalize(path) {
        let given = targets.dirs[0].clone();
        let given_dir = std::fs::canonicalize(&given).unwrap_or(given);
        let same_dir = resolved.parent() == Some(given_dir.as_path());
        let same_name = resolved.file_name() == path.file_name();
        if !(same_dir && same_name) {
            tracing::debug!(target = %resolved.display(), "Rule file is a link; watching its target too");
            if same_dir {
                targets.names.extend(resolved.file_name().map(OsStr::to_os_string));
            } else {
                targets.add(&resolved);
            }
        }
    }
    targets
}

fn is_target(path: &Path, names: &[OsString]) -> bool {
    match path.file_name() {
        Some(name) => names.is_empty() || names.iter().any(|n| n == name),
        None => names.is_empty(),
    }
}

/// Map a raw notify event to a change of the watched file, if it is one.
fn classify(event: &Event, names: &[OsString]) -> Option<WatchEvent> {
    let touches = |i: usize| event.paths.get(i).is_some_and(|p| is_target(p, names));

    match event.kind {
        EventKind::Create(_) if event.paths.iter().any(|p| is_target(p, names)) => {
            Some(WatchEvent::Modified)
        }
        EventKind::Remove(_) if event.paths.iter().any(|p| is_target(p, names)) => {
            Some(WatchEvent::Removed)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) if touches(0) => Some(WatchEvent::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if touches(1) {
                Some(WatchEvent::Modified)
            } else if touches(0) {
                Some(WatchEvent::Removed)
            } else {
                None
            }
        }
        EventKind::Modify(_) if event.paths.iter().any(|p| is_target(p, names)) => {
            Some(WatchEvent::Modified)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for p in paths {
            event = event.add_path(PathBuf::from(p));
        }
        event
    }

    #[test]
    fn test_classify_ignores_other_files() {
        let name = &[OsString::from("rules.json")];
        let write = || EventKind::Modify(ModifyKind::Data(DataChange::Content));

        assert_eq!(classify(&event(write(), &["/etc/rules.json"]), name), Some(WatchEvent::Modified));
        assert_eq!(classify(&event(write(), &["/etc/other.json"]), name), None);
    }

    #[test]
    fn test_classify_create_and_remove() {
        let name = &[OsString::from("rules.json")];

        let created = event(EventKind::Create(CreateKind::File), &["/etc/rules.json"]);
        assert_eq!(classify(&created, name), Some(WatchEvent::Modified));

        let removed = event(EventKind::Remove(RemoveKind::File), &["/etc/rules.json"]);
        assert_eq!(classify(&removed, name), Some(WatchEvent::Removed));
    }

    #[test]
    fn test_classify_rename_over() {
        let name = &[OsString::from("rules.json")];
        let rename = || EventKind::Modify(ModifyKind::Name(RenameMode::Both));

        let into_place = event(rename(), &["/etc/.rules.json.swp", "/etc/rules.json"]);
        assert_eq!(classify(&into_place, name), Some(WatchEvent::Modified));

        let away = event(rename(), &["/etc/rules.json", "/etc/rules.json.bak"]);
        assert_eq!(classify(&away, name), Some(WatchEvent::Removed));
    }

    #[test]
    fn test_classify_ignores_access() {
        let name = &[OsString::from("rules.json")];
        let access = EventKind::Access(notify::event::AccessKind::Any);
        assert_eq!(classify(&event(access, &["/etc/rules.json"]), name), None);
    }

    #[test]
    fn test_targets_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(&path, "[]").unwrap();

        let targets = watch_targets(&path);
        assert_eq!(targets.dirs, vec![dir.path().to_path_buf()]);
        assert_eq!(targets.names, vec![OsString::from("rules.json")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_targets_follow_symlink() {
        let root = tempfile::tempdir().unwrap();
        let data = root.path().join("data");
        let etc = root.path().join("etc");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::create_dir_all(&etc).unwrap();
        std::fs::write(data.join("current.json"), "[]").unwrap();
        let link = etc.join("rules.json");
        std::os::unix::fs::symlink(data.join("current.json"), &link).unwrap();

        let targets = watch_targets(&link);
        assert_eq!(targets.dirs.len(), 2);
        assert_eq!(targets.dirs[0], etc);
        assert_eq!(targets.dirs[1], std::fs::canonicalize(&data).unwrap());
        assert_eq!(
            targets.names,
            vec![OsString::from("rules.json"), OsString::from("current.json")]
        );
    }

    #[tokio::test]
    async fn test_subscribe_missing_directory() {
        let result = ConfigWatcher::subscribe(Path::new("/nonexistent-dir/for/rules.json"));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_subscribe_reports_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(&path, "[]").unwrap();

        let (_watcher, mut events) = ConfigWatcher::subscribe(&path).unwrap();
        std::fs::write(&path, "[ ]").unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("no event within timeout");
        assert_eq!(received, Some(WatchEvent::Modified));
    }
}
