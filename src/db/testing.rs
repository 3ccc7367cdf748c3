//! In-memory driver used by unit tests.

use crate::db::dsn::Dsn;
use crate::db::handle::{Connector, NodeHandle, PoolControl};
use crate::db::policy::LogPolicy;
use crate::error::{DbError, DbResult};
use crate::models::{NodeConfig, PoolLimits, PoolStats};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Config resembling a production node; `database == "broken"` yields a
/// handle without a pool.
pub(crate) fn node_config(database: &str) -> NodeConfig {
    NodeConfig {
        dsn_options: "charset=utf8mb4".to_string(),
        max_idle: 16,
        max_open: 128,
        max_lifetime: Duration::from_secs(300),
        slow_time: Duration::from_secs(1),
        slow_logger: "slow".to_string(),
        ..NodeConfig::new("127.0.0.1:3306", "root", "123456", database)
    }
}

/// Fails to open any descriptor containing `unreachable`.
#[derive(Debug, Default)]
pub(crate) struct FakeConnector {
    opened: AtomicUsize,
}

impl FakeConnector {
    pub(crate) fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl Connector for FakeConnector {
    type Handle = FakeHandle;

    async fn open(&self, _node: &str, dsn: &Dsn, policy: &LogPolicy) -> DbResult<FakeHandle> {
        if dsn.expose().contains("unreachable") {
            return Err(DbError::internal("dial tcp: connection refused"));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        let pool = (!dsn.expose().contains("/broken")).then(FakePool::default);
        Ok(FakeHandle {
            dsn: dsn.expose().to_string(),
            policy: policy.clone(),
            pool,
        })
    }
}

#[derive(Debug)]
pub(crate) struct FakeHandle {
    pub(crate) dsn: String,
    pub(crate) policy: LogPolicy,
    pool: Option<FakePool>,
}

impl NodeHandle for FakeHandle {
    type Pool = FakePool;

    fn pool(&self) -> DbResult<&FakePool> {
        self.pool
            .as_ref()
            .ok_or_else(|| DbError::internal("sql: database is closed"))
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakePool {
    limits: Mutex<Option<PoolLimits>>,
    samples: AtomicUsize,
}

impl FakePool {
    pub(crate) fn applied_limits(&self) -> Option<PoolLimits> {
        *self.limits.lock().unwrap()
    }

    pub(crate) fn sample_count(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }
}

impl PoolControl for FakePool {
    fn apply_limits(&self, limits: &PoolLimits) {
        *self.limits.lock().unwrap() = Some(*limits);
    }

    fn stats(&self) -> PoolStats {
        self.samples.fetch_add(1, Ordering::SeqCst);
        let max_open = self.applied_limits().map(|l| l.max_open).unwrap_or(0);
        PoolStats {
            max_open,
            open: 3,
            in_use: 1,
            idle: 2,
            wait_count: 0,
            wait_duration: Duration::ZERO,
        }
    }
}

/// Fields of one event, merged with the fields of its enclosing spans.
#[derive(Debug, Clone, Default)]
pub(crate) struct Fields(BTreeMap<String, String>);

impl Fields {
    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    fn inherit(&mut self, parent: &Fields) {
        for (name, value) in &parent.0 {
            self.0.entry(name.clone()).or_insert_with(|| value.clone());
        }
    }
}

impl Visit for Fields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{:?}", value));
    }
}

/// Layer recording every event as `(target, fields)`.
#[derive(Clone, Default)]
pub(crate) struct LogCapture(Arc<Mutex<Vec<(String, Fields)>>>);

impl LogCapture {
    /// Captured events whose message contains `message`.
    pub(crate) fn events(&self, message: &str) -> Vec<(String, Fields)> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, fields)| fields.get("message").is_some_and(|m| m.contains(message)))
            .cloned()
            .collect()
    }
}

impl<S> Layer<S> for LogCapture
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut fields = Fields::default();
        attrs.record(&mut fields);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(fields);
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id)
            && let Some(fields) = span.extensions_mut().get_mut::<Fields>()
        {
            values.record(fields);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut fields = Fields::default();
        event.record(&mut fields);
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(parent) = span.extensions().get::<Fields>() {
                    fields.inherit(parent);
                }
            }
        }
        self.0
            .lock()
            .unwrap()
            .push((event.metadata().target().to_string(), fields));
    }
}
