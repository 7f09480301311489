//! Scoped trace sessions
//!
//! A [`TraceSession`] installs a `tracing` subscriber for the duration of a
//! single closure. Every span opened inside the scope is captured as a Chrome
//! trace "complete" event and written to `<sink>/trace.<pid>.<millis>.json`
//! when the scope ends, whether the closure succeeded or not. The resulting
//! file loads in `ui.perfetto.dev` or `chrome://tracing`.
//!
//! Engines mark accelerator work by opening spans with an `activity = "device"`
//! field; everything else is counted as CPU activity.
//!
//! ```rust,ignore
//! let session = TraceSession::new("/tmp/latency_profile");
//! let (outputs, report) = session.record(|| engine.generate(&prompts, &spec, false))?;
//! println!("{}", report.summary);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::types::{Activity, ProfilingError, ProfilingResult};
use crate::error::BenchResult;
use crate::logging::{installed_config, scoped_console_layer, LoggingConfig};

/// One Chrome trace "complete" event
#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub name: String,
    pub cat: String,
    pub ph: String,
    /// Start, microseconds since the session began
    pub ts: f64,
    /// Duration in microseconds
    pub dur: f64,
    pub pid: u32,
    pub tid: u32,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct TraceFile<'a> {
    #[serde(rename = "traceEvents")]
    trace_events: &'a [TraceEvent],
    #[serde(rename = "displayTimeUnit")]
    display_time_unit: &'static str,
}

/// Per-span-name aggregate, the equivalent of a profiler's key averages
#[derive(Debug, Clone, PartialEq)]
pub struct SpanStat {
    pub name: String,
    pub activity: Activity,
    pub calls: usize,
    pub total_us: f64,
}

impl SpanStat {
    pub fn avg_us(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.total_us / self.calls as f64
        }
    }
}

/// Aggregated view of a trace, sorted by total time descending
#[derive(Debug, Clone, Default)]
pub struct TraceSummary {
    pub stats: Vec<SpanStat>,
}

impl TraceSummary {
    pub fn from_events(events: &[TraceEvent]) -> Self {
        let mut by_key: BTreeMap<(String, Activity), SpanStat> = BTreeMap::new();
        for event in events {
            let activity = if event.cat == Activity::Device.category() {
                Activity::Device
            } else {
                Activity::Cpu
            };
            let stat = by_key
                .entry((event.name.clone(), activity))
                .or_insert_with(|| SpanStat {
                    name: event.name.clone(),
                    activity,
                    calls: 0,
                    total_us: 0.0,
                });
            stat.calls += 1;
            stat.total_us += event.dur;
        }

        let mut stats: Vec<SpanStat> = by_key.into_values().collect();
        stats.sort_by(|a, b| b.total_us.total_cmp(&a.total_us));
        TraceSummary { stats }
    }

    pub fn get(&self, name: &str) -> Option<&SpanStat> {
        self.stats.iter().find(|s| s.name == name)
    }

    /// Total time attributed to the given activity
    pub fn total_us(&self, activity: Activity) -> f64 {
        self.stats
            .iter()
            .filter(|s| s.activity == activity)
            .map(|s| s.total_us)
            .sum()
    }
}

impl fmt::Display for TraceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name_width = self
            .stats
            .iter()
            .map(|s| s.name.len())
            .max()
            .unwrap_or(4)
            .max(4);
        let rule = "-".repeat(name_width + 48);
        writeln!(f, "{}", rule)?;
        writeln!(
            f,
            "{:<nw$}  {:>8}  {:>6}  {:>12}  {:>12}",
            "Name",
            "Activity",
            "Calls",
            "Total (ms)",
            "Avg (ms)",
            nw = name_width
        )?;
        writeln!(f, "{}", rule)?;
        for stat in &self.stats {
            writeln!(
                f,
                "{:<nw$}  {:>8}  {:>6}  {:>12.3}  {:>12.3}",
                stat.name,
                stat.activity.to_string(),
                stat.calls,
                stat.total_us / 1000.0,
                stat.avg_us() / 1000.0,
                nw = name_width
            )?;
        }
        writeln!(f, "{}", rule)?;
        write!(
            f,
            "CPU total: {:.3} ms, Device total: {:.3} ms",
            self.total_us(Activity::Cpu) / 1000.0,
            self.total_us(Activity::Device) / 1000.0
        )
    }
}

/// What a finished session left behind
#[derive(Debug, Clone)]
pub struct TraceReport {
    /// The trace file written into the sink
    pub path: PathBuf,
    pub events: usize,
    pub summary: TraceSummary,
}

/// Timing state stored in the span's extensions
struct SpanTiming {
    name: String,
    activity: Activity,
    start: Instant,
    args: BTreeMap<String, String>,
}

#[derive(Default)]
struct FieldCollector {
    activity: Option<String>,
    args: BTreeMap<String, String>,
}

impl FieldCollector {
    fn put(&mut self, field: &Field, value: String) {
        if field.name() == "activity" {
            self.activity = Some(value);
        } else {
            self.args.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{:?}", value));
    }
}

/// Layer that turns closed spans into [`TraceEvent`]s
struct CaptureLayer {
    origin: Instant,
    pid: u32,
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = FieldCollector::default();
        attrs.record(&mut fields);
        let activity = fields
            .activity
            .as_deref()
            .map(Activity::from_tag)
            .unwrap_or(Activity::Cpu);
        span.extensions_mut().insert(SpanTiming {
            name: attrs.metadata().name().to_string(),
            activity,
            start: Instant::now(),
            args: fields.args,
        });
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = FieldCollector::default();
        values.record(&mut fields);
        let mut extensions = span.extensions_mut();
        if let Some(timing) = extensions.get_mut::<SpanTiming>() {
            timing.args.extend(fields.args);
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(&id) else { return };
        let extensions = span.extensions();
        let Some(timing) = extensions.get::<SpanTiming>() else {
            return;
        };
        let event = TraceEvent {
            name: timing.name.clone(),
            cat: timing.activity.category().to_string(),
            ph: "X".to_string(),
            ts: timing.start.duration_since(self.origin).as_secs_f64() * 1e6,
            dur: timing.start.elapsed().as_secs_f64() * 1e6,
            pid: self.pid,
            tid: match timing.activity {
                Activity::Cpu => 0,
                Activity::Device => 1,
            },
            args: timing.args.clone(),
        };
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// A profiling scope bound to one trace sink directory
#[derive(Debug, Clone)]
pub struct TraceSession {
    sink: PathBuf,
    /// Console output while the scope is active
    logging: LoggingConfig,
}

impl TraceSession {
    /// Session logging like the installed global subscriber, or the
    /// environment defaults when none is installed
    pub fn new(sink: impl AsRef<Path>) -> Self {
        TraceSession {
            sink: sink.as_ref().to_path_buf(),
            logging: installed_config().cloned().unwrap_or_default(),
        }
    }

    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Run `f` with span capture enabled and persist the trace afterwards.
    ///
    /// The trace is written even when `f` fails; the closure's error then
    /// takes precedence over any trace write error.
    pub fn record<T, F>(&self, f: F) -> BenchResult<(T, TraceReport)>
    where
        F: FnOnce() -> BenchResult<T>,
    {
        let events = Arc::new(Mutex::new(Vec::new()));
        let capture = CaptureLayer {
            origin: Instant::now(),
            pid: std::process::id(),
            events: Arc::clone(&events),
        };
        let console = scoped_console_layer(&self.logging);
        let subscriber = tracing_subscriber::registry().with(capture).with(console);

        let outcome = tracing::subscriber::with_default(subscriber, || {
            let _scope = tracing::info_span!("profiled_run").entered();
            f()
        });

        let events = events
            .lock()
            .map(|guard| guard.clone())
            .map_err(|e| ProfilingError::SessionError(format!("trace buffer poisoned: {}", e)))?;
        let written = self.persist(&events);

        let value = outcome?;
        let path = written?;
        Ok((
            value,
            TraceReport {
                path,
                events: events.len(),
                summary: TraceSummary::from_events(&events),
            },
        ))
    }

    fn persist(&self, events: &[TraceEvent]) -> ProfilingResult<PathBuf> {
        std::fs::create_dir_all(&self.sink).map_err(|e| {
            ProfilingError::IoError(format!("creating {}: {}", self.sink.display(), e))
        })?;

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let path = self
            .sink
            .join(format!("trace.{}.{}.json", std::process::id(), millis));

        let file = TraceFile {
            trace_events: events,
            display_time_unit: "ms",
        };
        let json = serde_json::to_string(&file)
            .map_err(|e| ProfilingError::IoError(format!("serializing trace: {}", e)))?;
        std::fs::write(&path, json)
            .map_err(|e| ProfilingError::IoError(format!("writing {}: {}", path.display(), e)))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BenchError;
    use crate::logging::{LogFormat, LogLevel};

    #[test]
    fn test_record_captures_cpu_and_device_spans() {
        let dir = tempfile::tempdir().unwrap();
        let session = TraceSession::new(dir.path().join("profile"));

        let (value, report) = session
            .record(|| {
                let _host = tracing::info_span!("build_request").entered();
                {
                    let _kernel = tracing::info_span!("decode", activity = "device", step = 3u64)
                        .entered();
                }
                Ok(42)
            })
            .unwrap();

        assert_eq!(value, 42);
        assert!(report.path.exists());
        assert!(report.path.starts_with(dir.path().join("profile")));
        // profiled_run + build_request + decode
        assert_eq!(report.events, 3);
        assert_eq!(report.summary.get("decode").unwrap().activity, Activity::Device);
        assert_eq!(report.summary.get("build_request").unwrap().activity, Activity::Cpu);

        let raw = std::fs::read_to_string(&report.path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let events = json["traceEvents"].as_array().unwrap();
        assert_eq!(events.len(), 3);
        let decode = events.iter().find(|e| e["name"] == "decode").unwrap();
        assert_eq!(decode["cat"], "kernel");
        assert_eq!(decode["ph"], "X");
        assert_eq!(decode["args"]["step"], "3");
    }

    #[test]
    fn test_fields_recorded_after_open_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let session = TraceSession::new(dir.path());

        let (_, report) = session
            .record(|| {
                let span = tracing::info_span!(
                    "decode",
                    activity = "device",
                    tokens = tracing::field::Empty
                );
                let _entered = span.enter();
                span.record("tokens", 7u64);
                Ok(())
            })
            .unwrap();

        let raw = std::fs::read_to_string(&report.path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let decode = json["traceEvents"]
            .as_array()
            .unwrap()
            .iter()
            .find(|e| e["name"] == "decode")
            .cloned()
            .unwrap();
        assert_eq!(decode["args"]["tokens"], "7");
        assert_eq!(decode["cat"], "kernel");
    }

    #[test]
    fn test_json_console_does_not_change_capture() {
        let dir = tempfile::tempdir().unwrap();
        let logging = LoggingConfig::new()
            .with_format(LogFormat::Json)
            .with_level(LogLevel::Debug);
        let session = TraceSession::new(dir.path()).with_logging(logging);

        let (_, report) = session
            .record(|| {
                let _span = tracing::debug_span!("prefill", activity = "device").entered();
                tracing::debug!("prefill issued");
                Ok(())
            })
            .unwrap();

        // profiled_run + prefill
        assert_eq!(report.events, 2);
        assert_eq!(report.summary.get("prefill").unwrap().activity, Activity::Device);
    }

    #[test]
    fn test_trace_written_when_closure_fails() {
        let dir = tempfile::tempdir().unwrap();
        let session = TraceSession::new(dir.path());

        let result: BenchResult<((), TraceReport)> = session.record(|| {
            let _span = tracing::info_span!("generate").entered();
            Err(BenchError::EngineFailure("boom".to_string()))
        });

        assert!(matches!(result, Err(BenchError::EngineFailure(_))));
        let written: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(written.len(), 1);
    }

    #[test]
    fn test_summary_aggregates_and_sorts() {
        let event = |name: &str, cat: &str, dur: f64| TraceEvent {
            name: name.to_string(),
            cat: cat.to_string(),
            ph: "X".to_string(),
            ts: 0.0,
            dur,
            pid: 1,
            tid: 0,
            args: BTreeMap::new(),
        };
        let summary = TraceSummary::from_events(&[
            event("decode", "kernel", 100.0),
            event("decode", "kernel", 300.0),
            event("generate", "cpu_op", 1000.0),
        ]);

        assert_eq!(summary.stats[0].name, "generate");
        let decode = summary.get("decode").unwrap();
        assert_eq!(decode.calls, 2);
        assert_eq!(decode.avg_us(), 200.0);
        assert_eq!(summary.total_us(Activity::Device), 400.0);

        let rendered = summary.to_string();
        assert!(rendered.contains("decode"));
        assert!(rendered.contains("Device total: 0.400 ms"));
    }
}
