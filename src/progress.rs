//! Aggregate progress counters and run timing.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};

use crate::models::Outcome;

/// Point-in-time copy of the progress counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub matched: usize,
    pub no_uid: usize,
    pub no_geometry: usize,
    pub total: usize,
}

impl ProgressSnapshot {
    /// POIs with a terminal outcome
    pub fn resolved(&self) -> usize {
        self.matched + self.no_uid + self.no_geometry
    }

    /// POIs without a terminal outcome
    pub fn missing(&self) -> usize {
        self.total.saturating_sub(self.resolved())
    }

    /// Share of all POIs that were matched, in [0, 1]
    pub fn matched_share(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.matched as f64 / self.total as f64
        }
    }
}

impl std::fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "C/N_Uid/N_Geo/Total: {}/{}/{}/{}",
            self.matched, self.no_uid, self.no_geometry, self.total
        )
    }
}

/// Monotonic counters shared by all workers.
///
/// Reads are approximate while workers are running.
#[derive(Debug, Default)]
pub struct Progress {
    matched: AtomicUsize,
    no_uid: AtomicUsize,
    no_geometry: AtomicUsize,
    arrivals: AtomicUsize,
    total: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Start from counts carried over from a previous run
    pub fn resume(snapshot: ProgressSnapshot) -> Self {
        Self {
            matched: AtomicUsize::new(snapshot.matched),
            no_uid: AtomicUsize::new(snapshot.no_uid),
            no_geometry: AtomicUsize::new(snapshot.no_geometry),
            arrivals: AtomicUsize::new(0),
            total: snapshot.total,
        }
    }

    pub fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Matched => &self.matched,
            Outcome::NoCandidates => &self.no_uid,
            Outcome::NoValidGeometry => &self.no_geometry,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one candidate arrival; returns the running total
    pub fn record_arrival(&self) -> usize {
        self.arrivals.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn arrivals(&self) -> usize {
        self.arrivals.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            matched: self.matched.load(Ordering::Relaxed),
            no_uid: self.no_uid.load(Ordering::Relaxed),
            no_geometry: self.no_geometry.load(Ordering::Relaxed),
            total: self.total,
        }
    }
}

/// Human-readable duration: `>24h`, `XhYmin`, `XminYs` or `Xs`
pub fn format_duration(secs: f64) -> String {
    if secs > 24.0 * 3600.0 {
        ">24h".to_string()
    } else if secs > 3600.0 {
        format!("{:.0}h{:.0}min", (secs / 3600.0).floor(), (secs % 3600.0 / 60.0).floor())
    } else if secs > 60.0 {
        format!("{:.0}min{:.0}s", (secs / 60.0).floor(), secs % 60.0)
    } else {
        format!("{:.0}s", secs)
    }
}

/// Average resolution speed, in POIs per second
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Speed(pub Option<f64>);

impl std::fmt::Display for Speed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(per_sec) => write!(f, "{:.2}/s ({:.0}/h)", per_sec, per_sec * 3600.0),
            None => write!(f, "nan/s (nan/h)"),
        }
    }
}

/// Wall clock of a run, measuring speed against the POIs resolved since start
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    started: DateTime<Utc>,
    initial: ProgressSnapshot,
}

impl RunClock {
    pub fn start(initial: ProgressSnapshot) -> Self {
        Self::start_at(initial, Utc::now())
    }

    pub fn start_at(initial: ProgressSnapshot, started: DateTime<Utc>) -> Self {
        Self { started, initial }
    }

    /// POIs this run still has to resolve at start
    pub fn to_resolve(&self) -> usize {
        self.initial.missing()
    }

    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        (now - self.started).num_milliseconds() as f64 / 1000.0
    }

    pub fn speed(&self, current: &ProgressSnapshot, now: DateTime<Utc>) -> Speed {
        let elapsed = self.elapsed_secs(now);
        if elapsed <= 0.0 {
            return Speed(None);
        }
        let done = current.resolved().saturating_sub(self.initial.resolved());
        Speed(Some(done as f64 / elapsed))
    }

    /// Estimated time remaining, `Inf` when nothing was resolved yet
    pub fn eta(&self, current: &ProgressSnapshot, now: DateTime<Utc>) -> String {
        match self.speed(current, now).0 {
            None => "nan".to_string(),
            Some(per_sec) if per_sec == 0.0 => "Inf".to_string(),
            Some(per_sec) => format_duration(current.missing() as f64 / per_sec),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_snapshot_display() {
        let progress = Progress::new(10);
        progress.record(Outcome::Matched);
        progress.record(Outcome::Matched);
        progress.record(Outcome::NoCandidates);
        progress.record(Outcome::NoValidGeometry);
        let snapshot = progress.snapshot();
        assert_eq!(snapshot.to_string(), "C/N_Uid/N_Geo/Total: 2/1/1/10");
        assert_eq!(snapshot.missing(), 6);
        assert!((snapshot.matched_share() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_arrival_counter() {
        let progress = Progress::new(1);
        assert_eq!(progress.record_arrival(), 1);
        assert_eq!(progress.record_arrival(), 2);
        assert_eq!(progress.arrivals(), 2);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.0), "30s");
        assert_eq!(format_duration(125.0), "2min5s");
        assert_eq!(format_duration(2.0 * 3600.0 + 15.0 * 60.0 + 7.0), "2h15min");
        assert_eq!(format_duration(25.0 * 3600.0), ">24h");
    }

    #[test]
    fn test_speed_and_eta() {
        let initial = ProgressSnapshot {
            matched: 10,
            no_uid: 0,
            no_geometry: 0,
            total: 110,
        };
        let started = Utc::now();
        let clock = RunClock::start_at(initial, started);
        assert_eq!(clock.to_resolve(), 100);

        let current = ProgressSnapshot {
            matched: 40,
            no_uid: 5,
            no_geometry: 5,
            total: 110,
        };
        let now = started + Duration::seconds(20);
        assert_eq!(clock.speed(&current, now).to_string(), "2.00/s (7200/h)");
        assert_eq!(clock.eta(&current, now), "30s");
        assert_eq!(clock.eta(&initial, now), "Inf");
        assert_eq!(clock.speed(&current, started).to_string(), "nan/s (nan/h)");
    }
}
