//! Processing session: owns per-POI candidate sets and outcomes.
//!
//! The session is shared by reference across workers. Its POI table is built
//! once; every slot carries its own lock and a write-once outcome cell, so
//! work on different POIs never contends.

use std::sync::{Mutex, OnceLock, PoisonError};

use geo::Polygon;
use hashbrown::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::feed::FeedError;
use crate::matching::{
    CandidateRanker, CandidateValidator, RankingPolicy, SearchFilter, ValidationPolicy,
};
use crate::models::{
    Candidate, CandidateDraft, CandidateRequest, Outcome, Poi, PoiId, PoiResult, SearchHit,
};
use crate::progress::{Progress, ProgressSnapshot};
use crate::tracker::{CompletionTracker, Phase, TrackerError, Transition};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("POI {0} is not part of this session")]
    UnknownPoi(PoiId),
    #[error("POI {0} has not received all of its candidates")]
    Incomplete(PoiId),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// Matching configuration for one session
#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub validation: ValidationPolicy,
    pub ranking: RankingPolicy,
    pub search: SearchFilter,
}

/// Result of a finalize call
#[derive(Debug, Clone, Copy)]
pub enum Finalized<'a> {
    /// This call wrote the outcome
    Recorded(&'a PoiResult),
    /// The outcome was already written; nothing changed
    AlreadyResolved(&'a PoiResult),
}

impl<'a> Finalized<'a> {
    pub fn result(&self) -> &'a PoiResult {
        match *self {
            Finalized::Recorded(result) | Finalized::AlreadyResolved(result) => result,
        }
    }
}

#[derive(Debug)]
struct PoiSlot {
    poi: Poi,
    admitted: Mutex<Vec<Candidate>>,
    result: OnceLock<PoiResult>,
}

#[derive(Debug)]
pub struct Session {
    order: Vec<PoiId>,
    slots: HashMap<PoiId, PoiSlot>,
    tracker: CompletionTracker,
    filter: SearchFilter,
    validator: CandidateValidator,
    ranker: CandidateRanker,
    progress: Progress,
}

impl Session {
    /// Create a session over the POIs still to resolve
    pub fn new(pois: Vec<Poi>, settings: MatchSettings) -> Self {
        let order: Vec<PoiId> = pois.iter().map(|p| p.id).collect();
        let progress = Progress::new(pois.len());
        let slots = pois
            .into_iter()
            .map(|poi| {
                (
                    poi.id,
                    PoiSlot {
                        poi,
                        admitted: Mutex::new(Vec::new()),
                        result: OnceLock::new(),
                    },
                )
            })
            .collect();

        Self {
            tracker: CompletionTracker::new(order.iter().copied()),
            order,
            slots,
            filter: settings.search,
            validator: CandidateValidator::new(settings.validation, settings.ranking),
            ranker: CandidateRanker::new(settings.ranking),
            progress,
        }
    }

    /// Continue counting from a previous run's progress.
    ///
    /// `snapshot.total` covers the whole dataset, resolved rows included.
    pub fn with_resumed(mut self, snapshot: ProgressSnapshot) -> Self {
        self.progress = Progress::resume(snapshot);
        self
    }

    fn slot(&self, poi: PoiId) -> Result<&PoiSlot, SessionError> {
        self.slots.get(&poi).ok_or(SessionError::UnknownPoi(poi))
    }

    /// Filter a POI's raw search hits and fix its expected candidate count.
    ///
    /// Returns the requests whose geometry should be fetched. With no
    /// survivors the POI resolves to `NoCandidates` right away.
    pub fn accept_search_results(
        &self,
        poi: PoiId,
        hits: &[SearchHit],
    ) -> Result<Vec<CandidateRequest>, SessionError> {
        let slot = self.slot(poi)?;
        let requests = self.filter.select(&slot.poi, hits);

        if let Transition::Completed = self.tracker.set_expected(poi, requests.len())? {
            self.finalize(poi)?;
        }
        Ok(requests)
    }

    /// Take one fetched geometry (or the failure to fetch it) for a request.
    ///
    /// Every call counts as an arrival. Returns the POI's result when this
    /// arrival completed it.
    pub fn accept_candidate(
        &self,
        request: CandidateRequest,
        fetched: Result<Option<Polygon<f64>>, FeedError>,
    ) -> Result<Option<&PoiResult>, SessionError> {
        let poi = request.poi;
        let slot = self.slot(poi)?;

        match fetched {
            Ok(Some(geometry)) => {
                let uid = request.uid.clone();
                match self
                    .validator
                    .validate(&slot.poi, CandidateDraft::new(request, geometry))
                {
                    Ok(candidate) => slot
                        .admitted
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(candidate),
                    Err(rejection) => debug!("POI {}: {} rejected: {}", poi, uid, rejection),
                }
            }
            Ok(None) => debug!("POI {}: {} has no geometry", poi, request.uid),
            Err(e) => warn!("POI {}: {} failed to parse AOI: {}", poi, request.uid, e),
        }

        self.progress.record_arrival();
        match self.tracker.record_arrival(poi)? {
            Transition::Completed => Ok(Some(self.finalize(poi)?.result())),
            Transition::Awaiting { .. } => Ok(None),
        }
    }

    /// Rank a completed POI and write its outcome.
    ///
    /// The outcome cell is write-once: later calls return
    /// [`Finalized::AlreadyResolved`] and leave it untouched.
    pub fn finalize(&self, poi: PoiId) -> Result<Finalized<'_>, SessionError> {
        let slot = self.slot(poi)?;
        if let Some(result) = slot.result.get() {
            return Ok(Finalized::AlreadyResolved(result));
        }

        let state = self.tracker.state(poi).ok_or(SessionError::UnknownPoi(poi))?;
        if state.phase() != Phase::Complete {
            return Err(SessionError::Incomplete(poi));
        }

        let mut recorded = false;
        let result = slot.result.get_or_init(|| {
            recorded = true;
            let mut admitted = slot.admitted.lock().unwrap_or_else(PoisonError::into_inner);
            // Ties go to the better upstream rank, whatever order fetches finished in
            admitted.sort_by_key(Candidate::search_rank);
            match self.ranker.select_best(&admitted) {
                Some(winner) => PoiResult::matched(poi, winner.clone()),
                None if state.expected == Some(0) => {
                    PoiResult::unmatched(poi, Outcome::NoCandidates)
                }
                None => PoiResult::unmatched(poi, Outcome::NoValidGeometry),
            }
        });

        if !recorded {
            return Ok(Finalized::AlreadyResolved(result));
        }
        self.progress.record(result.outcome);
        debug!(
            "POI {}: {} ({})",
            poi,
            result.outcome,
            result.source_name().unwrap_or("-")
        );
        Ok(Finalized::Recorded(result))
    }

    pub fn poi(&self, poi: PoiId) -> Option<&Poi> {
        self.slots.get(&poi).map(|s| &s.poi)
    }

    /// POIs in the order they were loaded
    pub fn pois(&self) -> impl Iterator<Item = &Poi> + '_ {
        self.order.iter().filter_map(|id| self.poi(*id))
    }

    pub fn result(&self, poi: PoiId) -> Option<&PoiResult> {
        self.slots.get(&poi).and_then(|s| s.result.get())
    }

    /// `None` while the POI is unresolved
    pub fn outcome(&self, poi: PoiId) -> Option<Outcome> {
        self.result(poi).map(|r| r.outcome)
    }

    /// Results written so far, in load order
    pub fn results(&self) -> impl Iterator<Item = &PoiResult> + '_ {
        self.order.iter().filter_map(|id| self.result(*id))
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn tracker(&self) -> &CompletionTracker {
        &self.tracker
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
