//! Hot reload of the combat config.
//!
//! `ConfigWatcher` watches the config file's directory with `notify` and
//! re-parses the file when it changes. A file that fails to parse or validate
//! is reported and the running config stays in place.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};

use crate::config::{CombatConfig, ConfigError};
use crate::sim::CombatSim;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReloadStatus {
    pub reload_count: u32,
    pub last_reload_success: bool,
    pub last_error: Option<String>,
}

pub struct ConfigWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    receiver: Receiver<notify::Result<Event>>,
    status: ReloadStatus,
}

impl ConfigWatcher {
    pub fn watch(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let (tx, rx) = channel();
        let mut watcher = notify::recommended_watcher(tx)?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %path.display(), "watching combat config");

        Ok(Self {
            path,
            _watcher: watcher,
            receiver: rx,
            status: ReloadStatus::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status(&self) -> &ReloadStatus {
        &self.status
    }

    /// Drain pending filesystem events. Returns the newly loaded config if
    /// the file changed since the last poll, or the load error.
    pub fn poll(&mut self) -> Option<Result<CombatConfig, ConfigError>> {
        let mut changed = false;
        while let Ok(result) = self.receiver.try_recv() {
            match result {
                Ok(event) => changed |= touches(&event, &self.path),
                Err(e) => tracing::warn!(error = %e, "file watcher error"),
            }
        }
        if !changed {
            return None;
        }

        let loaded = CombatConfig::load(&self.path);
        match &loaded {
            Ok(_) => {
                self.status.reload_count += 1;
                self.status.last_reload_success = true;
                self.status.last_error = None;
                tracing::info!(count = self.status.reload_count, "combat config reloaded from disk");
            }
            Err(e) => {
                self.status.last_reload_success = false;
                self.status.last_error = Some(e.to_string());
                tracing::error!(error = %e, "combat config reload failed, keeping current");
            }
        }
        Some(loaded)
    }

    /// Poll and push a successful reload into `sim`. Returns true if applied.
    pub fn apply_to(&mut self, sim: &mut CombatSim) -> bool {
        match self.poll() {
            Some(Ok(config)) => sim.reload_config(config).is_ok(),
            _ => false,
        }
    }
}

fn touches(event: &Event, path: &Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    let relevant = event.kind.is_modify() || matches!(event.kind, EventKind::Create(_));
    relevant && event.paths.iter().any(|p| p.file_name() == Some(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modify(path: &str) -> Event {
        Event {
            kind: EventKind::Modify(notify::event::ModifyKind::Data(
                notify::event::DataChange::Any,
            )),
            paths: vec![PathBuf::from(path)],
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_touches_matches_file_name() {
        let watched = Path::new("config/combat.ron");
        assert!(touches(&modify("/abs/config/combat.ron"), watched));
        assert!(!touches(&modify("config/other.ron"), watched));
    }

    #[test]
    fn test_access_events_ignored() {
        let event = Event {
            kind: EventKind::Access(notify::event::AccessKind::Any),
            paths: vec![PathBuf::from("config/combat.ron")],
            attrs: Default::default(),
        };
        assert!(!touches(&event, Path::new("config/combat.ron")));
    }

    #[test]
    fn test_poll_without_events_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("combat.ron");
        std::fs::write(&path, CombatConfig::default().to_ron()).unwrap();
        let mut watcher = ConfigWatcher::watch(&path).unwrap();
        assert!(watcher.poll().is_none());
        assert_eq!(watcher.status().reload_count, 0);
        assert_eq!(watcher.path(), path.as_path());
    }
}
