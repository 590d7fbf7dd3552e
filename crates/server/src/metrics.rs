//! Prometheus metrics for backup operations.
//!
//! The recorder is owned by [`MetricsRecorder`] rather than installed
//! globally: handles are registered once through `metrics::with_local_recorder`
//! and every update is mirrored into atomics so [`MetricsRecorder::snapshot`]
//! can be read without parsing the exposition text.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

use backup_controller_core::CommandClass;
use backup_controller_types::Location;
use chrono::{DateTime, Local};
use metrics::{counter, describe_counter, describe_gauge, gauge, Counter, Gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;

/// Shared by every metric name so existing dashboards keep working.
pub const NAMESPACE: &str = "clickhouse_backup";

struct ClassMetrics {
    successful: Counter,
    failed: Counter,
    last_start: Gauge,
    last_finish: Gauge,
    last_duration: Gauge,
    mirror: ClassMirror,
}

#[derive(Default)]
struct ClassMirror {
    successful: AtomicU64,
    failed: AtomicU64,
    last_start: AtomicI64,
    last_finish: AtomicI64,
    last_duration_ns: AtomicU64,
}

impl ClassMetrics {
    fn register(class: CommandClass) -> Self {
        let verb = class.as_str();
        let successful = format!("{NAMESPACE}_successful_{verb}s");
        let failed = format!("{NAMESPACE}_failed_{verb}s");
        let last_start = format!("{NAMESPACE}_last_{verb}_start");
        let last_finish = format!("{NAMESPACE}_last_{verb}_finish");
        let last_duration = format!("{NAMESPACE}_last_{verb}_duration");

        describe_counter!(successful.clone(), format!("Counter of successful {verb}s backup"));
        describe_counter!(failed.clone(), format!("Counter of failed {verb}s backup"));
        describe_gauge!(last_start.clone(), format!("Last backup {verb} start timestamp"));
        describe_gauge!(last_finish.clone(), format!("Last backup {verb} finish timestamp"));
        describe_gauge!(last_duration.clone(), format!("Backup {verb} duration in nanoseconds"));

        Self {
            successful: counter!(successful),
            failed: counter!(failed),
            last_start: gauge!(last_start),
            last_finish: gauge!(last_finish),
            last_duration: gauge!(last_duration),
            mirror: ClassMirror::default(),
        }
    }

    fn snapshot(&self) -> ClassSnapshot {
        ClassSnapshot {
            successful: self.mirror.successful.load(Ordering::Relaxed),
            failed: self.mirror.failed.load(Ordering::Relaxed),
            last_start: self.mirror.last_start.load(Ordering::Relaxed),
            last_finish: self.mirror.last_finish.load(Ordering::Relaxed),
            last_duration_ns: self.mirror.last_duration_ns.load(Ordering::Relaxed),
        }
    }
}

/// Current values for one operation class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassSnapshot {
    pub successful: u64,
    pub failed: u64,
    /// Unix seconds.
    pub last_start: i64,
    /// Unix seconds.
    pub last_finish: i64,
    pub last_duration_ns: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub classes: BTreeMap<&'static str, ClassSnapshot>,
    pub last_backup_size_local: u64,
    pub last_backup_size_remote: u64,
}

/// Per-class counters and gauges plus the last backup size gauges.
pub struct MetricsRecorder {
    handle: PrometheusHandle,
    classes: HashMap<CommandClass, ClassMetrics>,
    size_local: Gauge,
    size_remote: Gauge,
    size_local_mirror: AtomicU64,
    size_remote_mirror: AtomicU64,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let classes = CommandClass::TRACKED
                .into_iter()
                .map(|class| (class, ClassMetrics::register(class)))
                .collect();

            let local = format!("{NAMESPACE}_last_backup_size_local");
            let remote = format!("{NAMESPACE}_last_backup_size_remote");
            describe_gauge!(local.clone(), "Last local backup size in bytes");
            describe_gauge!(remote.clone(), "Last remote backup size in bytes");

            Self {
                handle,
                classes,
                size_local: gauge!(local),
                size_remote: gauge!(remote),
                size_local_mirror: AtomicU64::new(0),
                size_remote_mirror: AtomicU64::new(0),
            }
        })
    }

    /// Set the last-start gauge. Untracked classes are ignored.
    pub fn record_start(&self, class: CommandClass, at: DateTime<Local>) {
        let Some(m) = self.classes.get(&class) else {
            return;
        };
        let epoch = at.timestamp();
        m.last_start.set(epoch as f64);
        m.mirror.last_start.store(epoch, Ordering::Relaxed);
    }

    /// Set finish/duration gauges from the operation's own start instant and
    /// bump the success or failure counter.
    pub fn record_finish(&self, class: CommandClass, started: Instant, ok: bool) {
        let Some(m) = self.classes.get(&class) else {
            return;
        };
        let duration_ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        let finished = Local::now().timestamp();

        m.last_finish.set(finished as f64);
        m.mirror.last_finish.store(finished, Ordering::Relaxed);
        m.last_duration.set(duration_ns as f64);
        m.mirror.last_duration_ns.store(duration_ns, Ordering::Relaxed);

        if ok {
            m.successful.increment(1);
            m.mirror.successful.fetch_add(1, Ordering::Relaxed);
        } else {
            m.failed.increment(1);
            m.mirror.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn set_last_backup_size(&self, location: Location, bytes: u64) {
        let (gauge, mirror) = match location {
            Location::Local => (&self.size_local, &self.size_local_mirror),
            Location::Remote => (&self.size_remote, &self.size_remote_mirror),
        };
        gauge.set(bytes as f64);
        mirror.store(bytes, Ordering::Relaxed);
    }

    /// Prometheus text exposition.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            classes: self
                .classes
                .iter()
                .map(|(class, m)| (class.as_str(), m.snapshot()))
                .collect(),
            last_backup_size_local: self.size_local_mirror.load(Ordering::Relaxed),
            last_backup_size_remote: self.size_remote_mirror.load(Ordering::Relaxed),
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRecorder")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_counters_increment_once_per_finish() {
        let recorder = MetricsRecorder::new();
        let started = Instant::now();
        recorder.record_finish(CommandClass::Create, started, true);
        recorder.record_finish(CommandClass::Create, started, true);
        recorder.record_finish(CommandClass::Create, started, false);

        let snap = recorder.snapshot();
        let create = snap.classes["create"];
        assert_eq!(create.successful, 2);
        assert_eq!(create.failed, 1);
        assert!(create.last_finish > 0);
        assert_eq!(snap.classes["upload"], ClassSnapshot::default());
    }

    #[test]
    fn test_start_gauge_uses_given_time() {
        let recorder = MetricsRecorder::new();
        let at = Local.with_ymd_and_hms(2024, 5, 2, 3, 0, 0).unwrap();
        recorder.record_start(CommandClass::Restore, at);
        assert_eq!(recorder.snapshot().classes["restore"].last_start, at.timestamp());
    }

    #[test]
    fn test_delete_is_not_tracked() {
        let recorder = MetricsRecorder::new();
        recorder.record_start(CommandClass::Delete, Local::now());
        recorder.record_finish(CommandClass::Delete, Instant::now(), true);
        let snap = recorder.snapshot();
        assert_eq!(snap.classes.len(), 4);
        assert!(!snap.classes.contains_key("delete"));
        assert!(!recorder.render().contains("delete"));
    }

    #[test]
    fn test_render_uses_namespaced_names() {
        let recorder = MetricsRecorder::new();
        recorder.record_finish(CommandClass::Upload, Instant::now(), true);
        recorder.set_last_backup_size(Location::Remote, 4096);

        let text = recorder.render();
        assert!(text.contains("clickhouse_backup_successful_uploads 1"));
        assert!(text.contains("clickhouse_backup_last_backup_size_remote"));
        assert!(text.contains("clickhouse_backup_last_upload_duration"));
        assert_eq!(recorder.snapshot().last_backup_size_remote, 4096);
    }

    #[test]
    fn test_recorders_are_independent() {
        let a = MetricsRecorder::new();
        let b = MetricsRecorder::new();
        a.record_finish(CommandClass::Download, Instant::now(), true);
        assert_eq!(a.snapshot().classes["download"].successful, 1);
        assert_eq!(b.snapshot().classes["download"].successful, 0);
        assert!(!b.render().contains("clickhouse_backup_successful_downloads 1"));
    }
}
