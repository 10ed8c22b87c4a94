//! Scripted connections and a recording logger for exercising the engine without a
//! database.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::connection::NodeConnection;
use crate::error::{Result, RouterError};
use crate::logging::{render_fields, ClusterLogger, LogField, LogLevel};

/// Scripted answer to one probe.
#[derive(Debug, Clone)]
pub enum Reply {
    Primary(bool),
    /// Answer after sleeping, to control measured latency.
    Delayed(Duration, bool),
    Fail(String),
    /// Never answer.
    Hang,
}

/// Probe and close counters shared with the test.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    probes: AtomicUsize,
    closes: AtomicUsize,
}

impl ConnectionStats {
    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Connection answering probes from a script; once the script is exhausted it keeps
/// answering with the fallback reply, or fails.
#[derive(Debug)]
pub struct ScriptedConnection {
    database: String,
    script: Mutex<VecDeque<Reply>>,
    fallback: Option<Reply>,
    stats: Arc<ConnectionStats>,
}

impl ScriptedConnection {
    pub fn new(database: &str, script: Vec<Reply>) -> Self {
        Self {
            database: database.to_string(),
            script: Mutex::new(script.into()),
            fallback: None,
            stats: Arc::new(ConnectionStats::default()),
        }
    }

    pub fn repeating(database: &str, reply: Reply) -> Self {
        let mut conn = Self::new(database, Vec::new());
        conn.fallback = Some(reply);
        conn
    }

    pub fn stats(&self) -> Arc<ConnectionStats> {
        self.stats.clone()
    }

    fn next_reply(&self) -> Option<Reply> {
        self.script.lock().pop_front().or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl NodeConnection for ScriptedConnection {
    async fn is_primary(&self) -> Result<bool> {
        self.stats.probes.fetch_add(1, Ordering::SeqCst);
        match self.next_reply() {
            Some(Reply::Primary(primary)) => Ok(primary),
            Some(Reply::Delayed(delay, primary)) => {
                tokio::time::sleep(delay).await;
                Ok(primary)
            }
            Some(Reply::Fail(reason)) => Err(RouterError::Database(reason)),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(RouterError::Database("script exhausted".to_string())),
        }
    }

    fn database(&self) -> &str {
        &self.database
    }

    async fn close(&self) {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Logger keeping every event in memory.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    events: Mutex<Vec<(LogLevel, String, String)>>,
}

impl RecordingLogger {
    pub fn count(&self, level: LogLevel) -> usize {
        self.events.lock().iter().filter(|(l, _, _)| *l == level).count()
    }

    pub fn events(&self) -> Vec<(LogLevel, String, String)> {
        self.events.lock().clone()
    }
}

impl ClusterLogger for RecordingLogger {
    fn log(&self, level: LogLevel, message: &str, fields: &[LogField<'_>]) {
        self.events
            .lock()
            .push((level, message.to_string(), render_fields(fields)));
    }
}
