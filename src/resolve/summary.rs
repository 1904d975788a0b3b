//! Run start/update/finish reporting.

use std::sync::Mutex;

use anyhow::Result;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use aoi_resolver::progress::{format_duration, ProgressSnapshot, RunClock};

/// Logs the progress tuple, but only when it changed since the last line
#[derive(Debug, Default)]
pub struct ProgressLog {
    last: Mutex<Option<ProgressSnapshot>>,
}

impl ProgressLog {
    pub fn log_if_changed(&self, snapshot: ProgressSnapshot) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if *last != Some(snapshot) {
            *last = Some(snapshot);
            info!("{}", snapshot);
        }
    }
}

pub fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
            )?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

pub fn log_start(snapshot: &ProgressSnapshot, log: &ProgressLog) {
    info!("# ---------- Resolving started ---------- #");
    info!("-- POI total number: {}.", snapshot.total);
    info!("-- POIs to be resolved: {}.", snapshot.missing());
    log.log_if_changed(*snapshot);
}

pub fn log_update(clock: &RunClock, snapshot: &ProgressSnapshot, log: &ProgressLog) {
    let now = Utc::now();
    log.log_if_changed(*snapshot);
    info!(
        "-- Updated. Avg speed: {}. Time remaining: {}.",
        clock.speed(snapshot, now),
        clock.eta(snapshot, now)
    );
}

pub fn log_finish(clock: &RunClock, snapshot: &ProgressSnapshot, log: &ProgressLog) {
    let now = Utc::now();
    log.log_if_changed(*snapshot);
    info!("# ---------- Resolving ended ---------- #");
    info!(
        "Avg speed: {}. Total time: {}.",
        clock.speed(snapshot, now),
        format_duration(clock.elapsed_secs(now))
    );
    info!(
        "{} POIs missing. {:.2}% POIs matched.",
        snapshot.missing(),
        snapshot.matched_share() * 100.0
    );
}
