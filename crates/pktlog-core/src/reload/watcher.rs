//! Reload loop

use super::{ReloadTargets, ReloadTrigger};
use crate::config::{Config, ObservationSettings};
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// How long to let a burst of triggers settle before reloading
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(250);

/// Result of one reload attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new snapshot was published
    Applied,
    /// The file parsed to the snapshot already in force
    Unchanged,
    /// The file could not be read, parsed or validated; nothing changed
    Rejected,
}

/// Re-reads the config file on every trigger and publishes the result
///
/// A bad edit never replaces the configuration in force. Once a reload
/// applies a snapshot with auto reload turned off, the watcher exits and
/// cannot be restarted without restarting the process.
pub struct ConfigReloadWatcher {
    path: PathBuf,
    targets: ReloadTargets,
    current: ObservationSettings,
    settle: Duration,
    consecutive_failures: u32,
}

impl ConfigReloadWatcher {
    /// Create a watcher starting from the snapshot already in force
    pub fn new(
        path: impl Into<PathBuf>,
        targets: ReloadTargets,
        current: ObservationSettings,
    ) -> Self {
        Self {
            path: path.into(),
            targets,
            current,
            settle: DEFAULT_SETTLE,
            consecutive_failures: 0,
        }
    }

    /// Override the settle period
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Config file being reloaded
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot currently in force
    pub fn current(&self) -> &ObservationSettings {
        &self.current
    }

    /// Whether further triggers will be acted on
    pub fn is_watching(&self) -> bool {
        self.current.auto_reload
    }

    /// Reload once
    pub fn reload(&mut self) -> ReloadOutcome {
        let settings = match self.read_settings() {
            Ok(settings) => settings,
            Err(e) => {
                self.consecutive_failures += 1;
                error!(
                    path = %self.path.display(),
                    error = %e,
                    consecutive_failures = self.consecutive_failures,
                    "Config reload failed, keeping previous configuration"
                );
                return ReloadOutcome::Rejected;
            }
        };
        self.consecutive_failures = 0;

        if settings == self.current {
            debug!(path = %self.path.display(), "Config unchanged");
            return ReloadOutcome::Unchanged;
        }

        self.targets.apply(&settings);
        info!(
            entry_count = settings.filter_entries.len(),
            receive = %settings.receive_cadence,
            send = %settings.send_cadence,
            auto_reload = settings.auto_reload,
            "Config reloaded"
        );
        self.current = settings;
        ReloadOutcome::Applied
    }

    fn read_settings(&self) -> Result<ObservationSettings> {
        let config = Config::load(&self.path)?;
        config.validate()?;
        Ok(config.observation())
    }

    /// Reload on every trigger until auto reload is turned off or the
    /// trigger source closes
    pub async fn run(mut self, mut triggers: mpsc::Receiver<ReloadTrigger>) {
        debug!(path = %self.path.display(), "Config reload watcher started");

        while let Some(trigger) = triggers.recv().await {
            debug!(?trigger, "Reload triggered");

            if !self.settle.is_zero() {
                tokio::time::sleep(self.settle).await;
            }
            while triggers.try_recv().is_ok() {}

            self.reload();

            if !self.is_watching() {
                info!(
                    path = %self.path.display(),
                    "Config auto reload disabled, no longer watching"
                );
                return;
            }
        }

        debug!("Reload trigger source closed");
    }
}
