//! In-memory ring of recent warn+ records, fed by a tracing layer.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Level, span};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// A warn+ log record kept in memory.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    /// Monotonic sequence number, starting at 1.
    pub seq: u64,
    /// RFC 3339 timestamp.
    pub timestamp: String,
    /// `WARN` or `ERROR`.
    pub level: String,
    /// Event target (module path).
    pub target: String,
    /// Rendered message.
    pub message: String,
    /// Remaining structured fields.
    pub fields: Map<String, Value>,
    /// Renderer context the record relates to, from the event or an enclosing span.
    pub context_id: Option<String>,
}

/// Filter for [`RecentLogSink::query`].
#[derive(Clone, Debug, Default)]
pub struct LogQuery {
    /// Exact level match (`"WARN"`, `"ERROR"`).
    pub level: Option<String>,
    /// Substring of the target.
    pub target: Option<String>,
    /// Exact context id.
    pub context_id: Option<String>,
    /// Maximum records returned, newest first. Defaults to 100.
    pub limit: Option<usize>,
}

/// Bounded ring of the most recent warn+ records.
pub struct RecentLogSink {
    records: Mutex<VecDeque<LogRecord>>,
    capacity: usize,
    next_seq: AtomicU64,
}

impl RecentLogSink {
    /// Create a sink keeping at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            next_seq: AtomicU64::new(1),
        }
    }

    fn insert(&self, mut record: LogRecord) {
        if self.capacity == 0 {
            return;
        }
        record.seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            let _ = records.pop_front();
        }
        records.push_back(record);
    }

    /// Matching records, newest first.
    pub fn query(&self, q: &LogQuery) -> Vec<LogRecord> {
        let limit = q.limit.unwrap_or(100);
        self.records
            .lock()
            .iter()
            .rev()
            .filter(|r| q.level.as_ref().is_none_or(|l| &r.level == l))
            .filter(|r| q.target.as_ref().is_none_or(|t| r.target.contains(t.as_str())))
            .filter(|r| {
                q.context_id
                    .as_ref()
                    .is_none_or(|c| r.context_id.as_ref() == Some(c))
            })
            .take(limit)
            .cloned()
            .collect()
    }

    /// Records currently held.
    pub fn count(&self) -> usize {
        self.records.lock().len()
    }
}

/// tracing Layer that copies warn+ events into a [`RecentLogSink`].
pub struct RecentLogLayer {
    sink: Arc<RecentLogSink>,
}

impl RecentLogLayer {
    /// Wrap a sink.
    pub fn new(sink: Arc<RecentLogSink>) -> Self {
        Self { sink }
    }
}

/// Splits an event's fields into message, `context_id` and the rest.
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
    context_id: Option<String>,
}

impl FieldVisitor {
    fn put(&mut self, field: &Field, value: Value) {
        match (field.name(), value) {
            ("message", Value::String(text)) => self.message = Some(text),
            ("context_id", Value::String(id)) => self.context_id = Some(id),
            ("context_id", other) => self.context_id = Some(other.to_string()),
            (name, value) => {
                let _ = self.fields.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let rendered = format!("{value:?}");
        // `%display` fields arrive here already unquoted; `?debug` strings keep their quotes.
        let rendered = if field.name() == "context_id" {
            rendered.trim_matches('"').to_string()
        } else {
            rendered
        };
        self.put(field, Value::String(rendered));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::Bool(value));
    }
}

/// Stored on spans so child events inherit their `context_id`.
struct SpanContext(String);

impl<S> Layer<S> for RecentLogLayer
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > Level::WARN {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let context_id = visitor.context_id.or_else(|| {
            ctx.event_scope(event)?
                .find_map(|span| span.extensions().get::<SpanContext>().map(|SpanContext(id)| id.clone()))
        });

        self.sink.insert(LogRecord {
            seq: 0,
            timestamp: Utc::now().to_rfc3339(),
            level: level.to_string().to_uppercase(),
            target: event.metadata().target().to_string(),
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
            context_id,
        });
    }

    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);

        if let (Some(context_id), Some(span)) = (visitor.context_id, ctx.span(id)) {
            span.extensions_mut().insert(SpanContext(context_id));
        }
    }
}
