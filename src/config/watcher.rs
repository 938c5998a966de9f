//! Config file watcher applying runtime-switchable settings.
//!
//! Only `api.ignore_ssl_errors` and `[failover.resolution]` can change on a
//! running dispatcher. Everything else in a reloaded file is ignored until
//! restart.

use std::path::{Path, PathBuf};
use std::time::Duration;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ApiConfig;
use crate::failover::ApiResolutionSettings;

/// The part of `ApiConfig` a running dispatcher accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub ignore_ssl_errors: bool,
    pub resolution: ApiResolutionSettings,
}

impl From<&ApiConfig> for RuntimeSettings {
    fn from(config: &ApiConfig) -> Self {
        Self {
            ignore_ssl_errors: config.api.ignore_ssl_errors,
            resolution: config.failover.resolution.clone(),
        }
    }
}

/// Reload step run on every file event.
struct Reloader {
    path: PathBuf,
    current: RuntimeSettings,
    tx: mpsc::UnboundedSender<RuntimeSettings>,
}

impl Reloader {
    /// Re-read the file and forward the runtime settings if they moved.
    /// Returns whether an update was delivered.
    fn on_change(&mut self) -> bool {
        let config = match load_config(&self.path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "Failed to reload config, keeping current settings");
                return false;
            }
        };

        let settings = RuntimeSettings::from(&config);
        if settings == self.current {
            tracing::debug!(path = %self.path.display(), "Config reloaded, no runtime-switchable change");
            return false;
        }

        if self.tx.send(settings.clone()).is_err() {
            tracing::warn!(path = %self.path.display(), "Config update receiver closed, dropping reload");
            return false;
        }
        self.current = settings;
        true
    }
}

/// Watches the config file and emits `RuntimeSettings` when they change.
pub struct ConfigWatcher {
    reloader: Reloader,
}

impl ConfigWatcher {
    /// `initial` is the config the dispatcher was started with.
    pub fn new(path: &Path, initial: &ApiConfig) -> (Self, mpsc::UnboundedReceiver<RuntimeSettings>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let reloader = Reloader {
            path: path.to_path_buf(),
            current: RuntimeSettings::from(initial),
            tx,
        };
        (Self { reloader }, rx)
    }

    /// Start watching. Keep the returned watcher alive for as long as
    /// updates are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.reloader.path.clone();
        let mut reloader = self.reloader;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    tracing::info!(path = %reloader.path.display(), "Config file change detected, reloading");
                    if reloader.on_change() {
                        tracing::info!(
                            ignore_ssl_errors = reloader.current.ignore_ssl_errors,
                            automatic = reloader.current.resolution.automatic,
                            "Runtime settings updated"
                        );
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_config(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("server-api-{}-{}.toml", name, std::process::id()));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_only_runtime_changes_are_forwarded() {
        let path = temp_config("reload", "[api]\nignore_ssl_errors = false\n");
        let initial = load_config(&path).unwrap();
        let (watcher, mut rx) = ConfigWatcher::new(&path, &initial);
        let mut reloader = watcher.reloader;

        // Restart-only field.
        fs::write(&path, "[api]\nignore_ssl_errors = false\nlog_api_response = true\n").unwrap();
        assert!(!reloader.on_change());
        assert!(rx.try_recv().is_err());

        fs::write(
            &path,
            "[api]\nignore_ssl_errors = true\n\n[failover.resolution]\nautomatic = false\nmanual_address = \"manual.example.net\"\n",
        )
        .unwrap();
        assert!(reloader.on_change());
        assert_eq!(
            rx.try_recv().unwrap(),
            RuntimeSettings {
                ignore_ssl_errors: true,
                resolution: ApiResolutionSettings {
                    automatic: false,
                    manual_address: "manual.example.net".into(),
                },
            }
        );

        // Same settings again.
        assert!(!reloader.on_change());

        fs::write(&path, "[api\n").unwrap();
        assert!(!reloader.on_change());
        assert!(rx.try_recv().is_err());

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_closed_receiver_keeps_current_settings() {
        let path = temp_config("closed", "[api]\nignore_ssl_errors = false\n");
        let initial = load_config(&path).unwrap();
        let (watcher, rx) = ConfigWatcher::new(&path, &initial);
        let mut reloader = watcher.reloader;
        drop(rx);

        fs::write(&path, "[api]\nignore_ssl_errors = true\n").unwrap();
        assert!(!reloader.on_change());
        assert!(!reloader.current.ignore_ssl_errors);

        fs::remove_file(&path).ok();
    }
}
