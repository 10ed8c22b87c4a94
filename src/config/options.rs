//! Construction-time options of a [`Cluster`](crate::cluster::Cluster).
//!
//! Options are plain values applied in order before monitoring starts; when the same
//! tunable is set twice the last option wins.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{DEFAULT_UPDATE_INTERVAL, DEFAULT_UPDATE_TIMEOUT};
use crate::logging::ClusterLogger;

/// Tunables of a cluster.
#[derive(Clone)]
pub struct ClusterSettings {
    pub logger: Option<Arc<dyn ClusterLogger>>,
    pub update_interval: Duration,
    pub update_timeout: Duration,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            logger: None,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            update_timeout: DEFAULT_UPDATE_TIMEOUT,
        }
    }
}

impl ClusterSettings {
    pub fn from_options(options: impl IntoIterator<Item = ClusterOption>) -> Self {
        let mut settings = Self::default();
        for option in options {
            option.apply(&mut settings);
        }
        settings
    }
}

impl fmt::Debug for ClusterSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterSettings")
            .field("logger", &self.logger.as_ref().map(|_| "<logger>"))
            .field("update_interval", &self.update_interval)
            .field("update_timeout", &self.update_timeout)
            .finish()
    }
}

/// One construction-time option.
#[derive(Clone)]
pub enum ClusterOption {
    Logger(Arc<dyn ClusterLogger>),
    UpdateInterval(Duration),
    UpdateTimeout(Duration),
}

impl ClusterOption {
    pub fn apply(self, settings: &mut ClusterSettings) {
        match self {
            ClusterOption::Logger(logger) => settings.logger = Some(logger),
            ClusterOption::UpdateInterval(interval) => settings.update_interval = interval,
            ClusterOption::UpdateTimeout(timeout) => settings.update_timeout = timeout,
        }
    }
}

impl fmt::Debug for ClusterOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterOption::Logger(_) => f.write_str("Logger(..)"),
            ClusterOption::UpdateInterval(d) => f.debug_tuple("UpdateInterval").field(d).finish(),
            ClusterOption::UpdateTimeout(d) => f.debug_tuple("UpdateTimeout").field(d).finish(),
        }
    }
}

/// Emit node health events through `logger`.
pub fn with_logger(logger: impl ClusterLogger + 'static) -> ClusterOption {
    ClusterOption::Logger(Arc::new(logger))
}

/// Time between two health-check rounds.
pub fn with_update_interval(interval: Duration) -> ClusterOption {
    ClusterOption::UpdateInterval(interval)
}

/// Deadline shared by all probes of one round.
pub fn with_update_timeout(timeout: Duration) -> ClusterOption {
    ClusterOption::UpdateTimeout(timeout)
}
