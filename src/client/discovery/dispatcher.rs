//! Turns a classified swipe into deck changes and like requests.
//!
//! Work is split in three steps so the network call never holds the deck:
//! `dispatch` (synchronous, starts the acknowledgment and handles pass/reset),
//! `submit` (the like request), and `resolve` (applies the response).

use std::collections::HashSet;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::client::discovery::deck::DeckController;
use crate::client::discovery::gesture::SwipeOutcome;
use crate::client::discovery::match_coordinator::MatchCoordinator;
use crate::client::error::ApiError;
use crate::client::services::api_client::DiscoveryApi;
use crate::common::models::{CandidateId, LikeKind, LikeResult};

/// Time-boxed badge shown after an action. Purely visual; nothing waits on it.
#[derive(Debug, Clone)]
pub struct ActionAck {
    duration: Duration,
    current: Option<(SwipeOutcome, Instant)>,
}

impl ActionAck {
    pub fn new(duration: Duration) -> Self {
        Self { duration, current: None }
    }

    pub fn show(&mut self, outcome: SwipeOutcome, now: Instant) {
        self.current = Some((outcome, now));
    }

    /// The badge still on screen at `now`, if any.
    pub fn visible(&self, now: Instant) -> Option<SwipeOutcome> {
        self.current
            .filter(|(_, shown_at)| now.saturating_duration_since(*shown_at) < self.duration)
            .map(|(outcome, _)| outcome)
    }
}

/// A like or super-like waiting for the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLike {
    pub candidate_id: CandidateId,
    pub kind: LikeKind,
    epoch: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Candidate not on the deck, or a like for it is already in flight.
    Ignored,
    /// Below threshold; the card goes back to rest.
    Reset,
    /// Removed immediately, no request.
    Passed(CandidateId),
    /// Caller must `submit` and then `resolve`.
    Pending(PendingLike),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Like recorded without a match; the card is gone.
    Recorded(CandidateId),
    /// Mutual match; the card stays until the celebration ends.
    Matched(CandidateId),
    /// Request failed; the deck is untouched. The message is for a notice.
    Failed { candidate_id: CandidateId, message: String },
    /// The owning view was torn down before the response arrived.
    Stale(CandidateId),
}

#[derive(Debug)]
pub struct ActionDispatcher {
    ack: ActionAck,
    in_flight: HashSet<CandidateId>,
    epoch: u64,
}

impl ActionDispatcher {
    pub fn new(ack_duration: Duration) -> Self {
        Self {
            ack: ActionAck::new(ack_duration),
            in_flight: HashSet::new(),
            epoch: 0,
        }
    }

    pub fn ack(&self) -> &ActionAck {
        &self.ack
    }

    pub fn is_in_flight(&self, id: &CandidateId) -> bool {
        self.in_flight.contains(id)
    }

    pub fn dispatch(
        &mut self,
        candidate_id: &CandidateId,
        outcome: SwipeOutcome,
        deck: &mut DeckController,
        now: Instant,
    ) -> Dispatch {
        if outcome == SwipeOutcome::Reset {
            return Dispatch::Reset;
        }
        if !deck.contains(candidate_id) || self.in_flight.contains(candidate_id) {
            debug!("[DISPATCH] {:?} on {} ignored", outcome, candidate_id);
            return Dispatch::Ignored;
        }

        self.ack.show(outcome, now);

        match outcome.like_kind() {
            None => {
                deck.remove_candidate(candidate_id);
                info!("[DISPATCH] Passed on {}", candidate_id);
                Dispatch::Passed(candidate_id.clone())
            }
            Some(kind) => {
                self.in_flight.insert(candidate_id.clone());
                Dispatch::Pending(PendingLike {
                    candidate_id: candidate_id.clone(),
                    kind,
                    epoch: self.epoch,
                })
            }
        }
    }

    pub async fn submit<A: DiscoveryApi>(api: &A, pending: &PendingLike) -> Result<LikeResult, ApiError> {
        debug!("[DISPATCH] Sending {} for {}", pending.kind, pending.candidate_id);
        api.submit_like(&pending.candidate_id, pending.kind).await
    }

    pub fn resolve(
        &mut self,
        pending: PendingLike,
        result: Result<LikeResult, ApiError>,
        deck: &mut DeckController,
        matches: &mut MatchCoordinator,
    ) -> Resolution {
        let PendingLike { candidate_id, kind, epoch } = pending;
        if epoch != self.epoch {
            debug!("[DISPATCH] Dropping {} response for {} from a closed view", kind, candidate_id);
            return Resolution::Stale(candidate_id);
        }
        self.in_flight.remove(&candidate_id);

        match result {
            Ok(LikeResult { is_match: false, .. }) => {
                deck.remove_candidate(&candidate_id);
                info!("[DISPATCH] {} recorded for {}, waiting for mutual like", kind, candidate_id);
                Resolution::Recorded(candidate_id)
            }
            Ok(LikeResult { is_match: true, matched }) => {
                let candidate = deck
                    .get(&candidate_id)
                    .cloned()
                    .or_else(|| matched.as_ref().map(|m| m.user.clone()));
                match candidate {
                    Some(candidate) => {
                        // Already celebrated once; nothing will end a new
                        // celebration, so the card goes now.
                        if !matches.present(candidate, matched) {
                            deck.remove_candidate(&candidate_id);
                        }
                    }
                    None => warn!("[DISPATCH] Match with {} but no profile to celebrate", candidate_id),
                }
                Resolution::Matched(candidate_id)
            }
            Err(e) => {
                warn!("[DISPATCH] {} for {} failed: {}", kind, candidate_id, e);
                Resolution::Failed { candidate_id, message: e.to_string() }
            }
        }
    }

    /// Invalidates every pending like; their responses resolve as `Stale`.
    pub fn invalidate(&mut self) {
        self.epoch += 1;
        self.in_flight.clear();
    }
}
