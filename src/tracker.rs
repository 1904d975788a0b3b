//! Per-POI completion tracking for asynchronously arriving candidates.
//!
//! Each POI moves `Pending -> Awaiting(expected, received) -> Complete`. The
//! table is built once and each entry has its own lock, so arrivals for
//! different POIs never contend.

use std::sync::{Mutex, PoisonError};

use hashbrown::HashMap;
use thiserror::Error;
use tracing::warn;

use crate::models::PoiId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("POI {0} is not tracked")]
    UnknownPoi(PoiId),
    #[error("expected count for POI {0} was already set")]
    DuplicateExpected(PoiId),
    #[error("arrival for POI {0} before its expected count was set")]
    ArrivalBeforeExpected(PoiId),
    #[error("POI {poi} received {received} arrivals but expected {expected}")]
    Overflow {
        poi: PoiId,
        expected: usize,
        received: usize,
    },
}

/// Coarse state of one POI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Awaiting,
    Complete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionState {
    pub expected: Option<usize>,
    pub received: usize,
    /// The completion edge has been handed out
    pub fired: bool,
}

impl CompletionState {
    pub fn phase(&self) -> Phase {
        match self.expected {
            None => Phase::Pending,
            Some(expected) if self.received == expected => Phase::Complete,
            Some(_) => Phase::Awaiting,
        }
    }
}

/// What a tracker call did to the POI's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Still waiting for more arrivals
    Awaiting { expected: usize, received: usize },
    /// `received == expected` was reached by this call. Returned once per POI.
    Completed,
}

#[derive(Debug, Default)]
pub struct CompletionTracker {
    entries: HashMap<PoiId, Mutex<CompletionState>>,
}

impl CompletionTracker {
    /// Track the given POIs, all starting `Pending`
    pub fn new(pois: impl IntoIterator<Item = PoiId>) -> Self {
        Self {
            entries: pois
                .into_iter()
                .map(|id| (id, Mutex::new(CompletionState::default())))
                .collect(),
        }
    }

    fn entry(&self, poi: PoiId) -> Result<&Mutex<CompletionState>, TrackerError> {
        self.entries.get(&poi).ok_or(TrackerError::UnknownPoi(poi))
    }

    fn update<T>(
        &self,
        poi: PoiId,
        f: impl FnOnce(&mut CompletionState) -> Result<T, TrackerError>,
    ) -> Result<T, TrackerError> {
        let mut state = self
            .entry(poi)?
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Set how many arrivals to wait for. Allowed once per POI.
    ///
    /// A count of zero completes the POI immediately.
    pub fn set_expected(&self, poi: PoiId, count: usize) -> Result<Transition, TrackerError> {
        self.update(poi, |state| {
            if state.expected.is_some() {
                return Err(TrackerError::DuplicateExpected(poi));
            }
            state.expected = Some(count);
            Ok(Self::edge(state, count))
        })
    }

    /// Count one arrival (admitted or not) for the POI.
    ///
    /// Arrivals past the expected count are still counted and reported as
    /// [`TrackerError::Overflow`].
    pub fn record_arrival(&self, poi: PoiId) -> Result<Transition, TrackerError> {
        self.update(poi, |state| {
            let expected = state
                .expected
                .ok_or(TrackerError::ArrivalBeforeExpected(poi))?;
            state.received += 1;
            if state.received > expected {
                warn!(
                    "POI {}: {} arrivals for {} expected",
                    poi, state.received, expected
                );
                return Err(TrackerError::Overflow {
                    poi,
                    expected,
                    received: state.received,
                });
            }
            Ok(Self::edge(state, expected))
        })
    }

    fn edge(state: &mut CompletionState, expected: usize) -> Transition {
        if state.received == expected && !state.fired {
            state.fired = true;
            Transition::Completed
        } else {
            Transition::Awaiting {
                expected,
                received: state.received,
            }
        }
    }

    pub fn is_complete(&self, poi: PoiId) -> bool {
        self.state(poi)
            .map(|s| s.phase() == Phase::Complete)
            .unwrap_or(false)
    }

    /// Snapshot of a POI's counters
    pub fn state(&self, poi: PoiId) -> Option<CompletionState> {
        self.entries
            .get(&poi)
            .map(|m| *m.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_zero_expected_completes_immediately() {
        let tracker = CompletionTracker::new([PoiId(0)]);
        assert_eq!(tracker.state(PoiId(0)).unwrap().phase(), Phase::Pending);
        assert_eq!(tracker.set_expected(PoiId(0), 0), Ok(Transition::Completed));
        assert!(tracker.is_complete(PoiId(0)));
    }

    #[test]
    fn test_completion_edge_fires_once() {
        let tracker = CompletionTracker::new([PoiId(0)]);
        assert_eq!(
            tracker.set_expected(PoiId(0), 2),
            Ok(Transition::Awaiting {
                expected: 2,
                received: 0
            })
        );
        assert!(!tracker.is_complete(PoiId(0)));
        assert_eq!(
            tracker.record_arrival(PoiId(0)),
            Ok(Transition::Awaiting {
                expected: 2,
                received: 1
            })
        );
        assert_eq!(tracker.record_arrival(PoiId(0)), Ok(Transition::Completed));
        assert!(tracker.is_complete(PoiId(0)));
    }

    #[test]
    fn test_overflow_is_reported_not_clamped() {
        let tracker = CompletionTracker::new([PoiId(3)]);
        tracker.set_expected(PoiId(3), 1).unwrap();
        tracker.record_arrival(PoiId(3)).unwrap();
        assert_eq!(
            tracker.record_arrival(PoiId(3)),
            Err(TrackerError::Overflow {
                poi: PoiId(3),
                expected: 1,
                received: 2
            })
        );
        assert_eq!(tracker.state(PoiId(3)).unwrap().received, 2);
        assert!(!tracker.is_complete(PoiId(3)));
    }

    #[test]
    fn test_contract_violations() {
        let tracker = CompletionTracker::new([PoiId(0)]);
        assert_eq!(
            tracker.record_arrival(PoiId(0)),
            Err(TrackerError::ArrivalBeforeExpected(PoiId(0)))
        );
        tracker.set_expected(PoiId(0), 1).unwrap();
        assert_eq!(
            tracker.set_expected(PoiId(0), 1),
            Err(TrackerError::DuplicateExpected(PoiId(0)))
        );
        assert_eq!(
            tracker.set_expected(PoiId(9), 1),
            Err(TrackerError::UnknownPoi(PoiId(9)))
        );
        assert!(!tracker.is_complete(PoiId(9)));
    }

    #[test]
    fn test_concurrent_arrivals_complete_once() {
        let ids: Vec<PoiId> = (0..8).map(PoiId).collect();
        let tracker = Arc::new(CompletionTracker::new(ids.clone()));
        for id in &ids {
            tracker.set_expected(*id, 100).unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                let ids = ids.clone();
                thread::spawn(move || {
                    let mut completed = 0;
                    for _ in 0..25 {
                        for id in &ids {
                            if let Ok(Transition::Completed) = tracker.record_arrival(*id) {
                                completed += 1;
                            }
                        }
                    }
                    completed
                })
            })
            .collect();

        let completed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(completed, ids.len());
    }
}
