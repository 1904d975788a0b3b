//! AOI resolver.
//!
//! Loads a POI table, replays the recorded place-search and AOI responses for
//! every unresolved POI, and writes the best-matching AOI polygon per POI.

mod summary;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures::stream::{self, StreamExt};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use aoi_resolver::config::Settings;
use aoi_resolver::dataset::PoiTable;
use aoi_resolver::feed::{FeedError, QueryBuilder, ReplaySource};
use aoi_resolver::matching::SearchFilter;
use aoi_resolver::models::PoiId;
use aoi_resolver::progress::RunClock;
use aoi_resolver::session::Session;

use crate::summary::{log_finish, log_start, log_update, progress_bar, ProgressLog};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "resolve")]
#[command(about = "Resolve the AOI polygon of each POI from recorded search responses")]
struct Args {
    /// Settings file
    #[arg(short, long, default_value = "resolver.toml")]
    config: PathBuf,

    /// POI CSV, overrides `input.poi_csv`
    #[arg(long)]
    input: Option<PathBuf>,

    /// Result CSV, overrides `input.output_csv`
    #[arg(long)]
    output: Option<PathBuf>,

    /// Recorded responses directory, overrides `input.responses`
    #[arg(long)]
    responses: Option<PathBuf>,

    /// Result shapefile, overrides `input.output_shp`
    #[arg(long)]
    output_shp: Option<PathBuf>,

    /// Start from the POI CSV even if a result file exists
    #[arg(long)]
    fresh: bool,
}

/// Shared, read-only pieces used by every lookup
struct Lookup<'a> {
    session: &'a Session,
    replay: &'a ReplaySource,
    queries: &'a QueryBuilder,
    filter: &'a SearchFilter,
    /// AOI reads in flight across all POIs
    fetches: &'a Semaphore,
    concurrency: usize,
    update_interval: usize,
    saves: &'a mpsc::Sender<()>,
}

impl Lookup<'_> {
    /// Run one POI through search, candidate fetches and ranking.
    ///
    /// Returns whether the POI reached a terminal outcome.
    async fn resolve(&self, id: PoiId) -> bool {
        let Some(poi) = self.session.poi(id) else {
            return false;
        };
        match self.queries.search_url(poi, &self.filter.required_tag(poi)) {
            Ok(url) => debug!("POI {}: search {}", id, url),
            Err(e) => warn!("POI {}: cannot build search URL: {}", id, e),
        }

        let hits = match self.replay.search(id).await {
            Ok(hits) => hits,
            Err(FeedError::Api(status)) if status.is_key_problem() => {
                error!("POI {}: {}, check the \"ak\" list", id, status);
                return false;
            }
            Err(e) => {
                error!("POI {} failed to parse uid: {}", id, e);
                return false;
            }
        };
        let requests = match self.session.accept_search_results(id, &hits) {
            Ok(requests) => requests,
            Err(e) => {
                warn!("POI {}: {}", id, e);
                return false;
            }
        };
        if requests.is_empty() {
            return self.session.outcome(id).is_some();
        }

        let mut arrivals = stream::iter(requests)
            .map(|request| async move {
                if let Ok(url) = self.queries.aoi_url(&request.uid) {
                    debug!("POI {}: fetch {}", id, url);
                }
                // Never closed, so acquiring only waits
                let _permit = self.fetches.acquire().await.ok();
                let fetched = self.replay.aoi(&request.uid).await;
                (request, fetched)
            })
            .buffer_unordered(self.concurrency);

        let mut resolved = false;
        while let Some((request, fetched)) = arrivals.next().await {
            match self.session.accept_candidate(request, fetched) {
                Ok(Some(_)) => resolved = true,
                Ok(None) => {}
                Err(e) => warn!("POI {}: {}", id, e),
            }
            if self.session.progress().arrivals() % self.update_interval == 0 {
                // A save already queued covers this one
                let _ = self.saves.try_send(());
            }
        }
        resolved
    }
}

/// Write the result CSV, and the shapefile when one is configured
fn save(
    table: &PoiTable,
    session: &Session,
    output: &Path,
    output_shp: Option<&Path>,
) -> Result<()> {
    table
        .write_results(output, |id| session.result(id))
        .with_context(|| format!("Failed to save {}", output.display()))?;
    if let Some(shp) = output_shp {
        let written = table
            .write_shapefile(shp, |id| session.result(id))
            .with_context(|| format!("Failed to save {}", shp.display()))?;
        debug!("Exported {} polygons to {}", written, shp.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut settings = Settings::load_from_file(&args.config)
        .with_context(|| format!("Failed to load settings from {}", args.config.display()))?;
    if let Some(input) = args.input {
        settings.input.poi_csv = input;
    }
    if let Some(output) = args.output {
        settings.input.output_csv = output;
    }
    if let Some(responses) = args.responses {
        settings.input.responses = responses;
    }
    if let Some(output_shp) = args.output_shp {
        settings.input.output_shp = Some(output_shp);
    }
    settings.validate().context("Invalid settings")?;
    info!("Settings validated");

    // Continue from an earlier result file when there is one
    let output = settings.input.output_csv.clone();
    let output_shp = settings.input.output_shp.clone();
    let source = if !args.fresh && output.exists() {
        info!("Resuming from {}", output.display());
        &output
    } else {
        &settings.input.poi_csv
    };
    let table = Arc::new(PoiTable::load(
        source,
        settings.input.crs,
        &settings.search.prim_ind,
        &settings.search.sec_ind,
    )?);

    let replay = ReplaySource::open(&settings.input.responses)?;
    let queries = settings.query_builder();
    let filter = settings.search_filter();
    let session = Arc::new(
        Session::new(table.pending_pois(), settings.match_settings()?)
            .with_resumed(table.progress()),
    );

    let log = Arc::new(ProgressLog::default());
    let clock = RunClock::start(session.progress().snapshot());
    log_start(&session.progress().snapshot(), &log);

    // Periodic saves run on their own task so lookups never wait on disk
    let (saves, mut save_requests) = mpsc::channel::<()>(1);
    let saver = {
        let table = Arc::clone(&table);
        let session = Arc::clone(&session);
        let log = Arc::clone(&log);
        let (output, output_shp) = (output.clone(), output_shp.clone());
        tokio::spawn(async move {
            while save_requests.recv().await.is_some() {
                let (table, session) = (Arc::clone(&table), Arc::clone(&session));
                let (output, output_shp) = (output.clone(), output_shp.clone());
                let saved = tokio::task::spawn_blocking(move || {
                    save(&table, &session, &output, output_shp.as_deref())?;
                    Ok::<_, anyhow::Error>(session.progress().snapshot())
                })
                .await;
                match saved {
                    Ok(Ok(snapshot)) => log_update(&clock, &snapshot, &log),
                    Ok(Err(e)) => error!("Failed to save results: {:#}", e),
                    Err(e) => error!("Save task failed: {}", e),
                }
            }
        })
    };

    let pb = progress_bar(clock.to_resolve() as u64)?;
    let fetches = Semaphore::new(settings.run.concurrency);
    let lookup = Lookup {
        session: &session,
        replay: &replay,
        queries: &queries,
        filter: &filter,
        fetches: &fetches,
        concurrency: settings.run.concurrency,
        update_interval: settings.run.update_interval,
        saves: &saves,
    };
    let pending: Vec<PoiId> = session.pois().map(|p| p.id).collect();
    stream::iter(pending)
        .map(|id| lookup.resolve(id))
        .buffer_unordered(settings.run.concurrency)
        .for_each(|resolved| {
            if resolved {
                pb.inc(1);
            }
            futures::future::ready(())
        })
        .await;
    pb.finish_and_clear();

    drop(lookup);
    drop(saves);
    saver.await.context("Saver task failed")?;

    save(&table, &session, &output, output_shp.as_deref())?;
    info!("Saved results to {}", output.display());
    log_finish(&clock, &session.progress().snapshot(), &log);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use aoi_resolver::matching::{RankingPolicy, ValidationPolicy};
    use aoi_resolver::models::{Crs, Outcome, Poi, Point};
    use aoi_resolver::session::MatchSettings;

    #[tokio::test]
    async fn test_single_fetch_permit_resolves_all_candidates() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("search")).unwrap();
        fs::create_dir_all(dir.path().join("aoi")).unwrap();
        let hits: Vec<String> = ["u1", "u2", "u3"]
            .iter()
            .map(|uid| {
                fs::write(dir.path().join(format!("aoi/{}.json", uid)), r#"{"content": {}}"#)
                    .unwrap();
                format!(
                    r#"{{"name": "北京大学", "uid": "{}", "location": {{"lat": 39.9, "lng": 116.3}}}}"#,
                    uid
                )
            })
            .collect();
        fs::write(
            dir.path().join("search/0.json"),
            format!(r#"{{"status": 0, "results": [{}]}}"#, hits.join(",")),
        )
        .unwrap();

        let poi = Poi::new(PoiId(0), "北京大学", Point::new(116.3, 39.9, Crs::Bd09Ll));
        let filter = SearchFilter::new(1000.0);
        let session = Session::new(
            vec![poi],
            MatchSettings {
                validation: ValidationPolicy::default(),
                ranking: RankingPolicy::default(),
                search: filter.clone(),
            },
        );
        let replay = ReplaySource::open(dir.path()).unwrap();
        let queries = QueryBuilder::new(vec!["ak".to_string()], 1000, true);
        let fetches = Semaphore::new(1);
        let (saves, mut save_requests) = mpsc::channel::<()>(1);
        let lookup = Lookup {
            session: &session,
            replay: &replay,
            queries: &queries,
            filter: &filter,
            fetches: &fetches,
            concurrency: 3,
            update_interval: 2,
            saves: &saves,
        };

        assert!(lookup.resolve(PoiId(0)).await);
        assert_eq!(session.outcome(PoiId(0)), Some(Outcome::NoValidGeometry));
        assert_eq!(session.progress().arrivals(), 3);
        assert_eq!(fetches.available_permits(), 1);
        assert!(save_requests.try_recv().is_ok());
    }
}
