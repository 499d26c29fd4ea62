use std::collections::HashSet;

use log::debug;

use crate::common::models::{Candidate, CandidateId};

/// Cards deeper than this all share the same scale and offset.
pub const MAX_DEPTH: usize = 2;
const SCALE_STEP: f64 = 0.02;
const MIN_SCALE: f64 = 0.92;
const OFFSET_STEP: f64 = 4.0;
const MAX_OFFSET: f64 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeckStatus {
    /// No batch has been loaded yet.
    #[default]
    NotLoaded,
    Active,
    /// Every loaded candidate has been swiped.
    Exhausted,
    /// A load left the deck empty: the fetch returned nobody.
    NoEligible,
}

/// Render information for one card of the stack.
#[derive(Debug, Clone, PartialEq)]
pub struct CardLayer {
    pub candidate_id: CandidateId,
    /// 0 for the top card.
    pub index_from_top: usize,
    /// Layer prominence: `max(0, 2 - index_from_top)`, so 2 on top.
    pub depth: usize,
    pub scale: f64,
    pub translate_y: f64,
    pub interactive: bool,
}

/// Owns the candidate stack. The last element is the top card; the stack is
/// only appended to on load and only shrinks while swiping.
#[derive(Debug, Clone, Default)]
pub struct DeckController {
    cards: Vec<Candidate>,
    status: DeckStatus,
}

impl DeckController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fetched batch under the current cards; the batch keeps its
    /// own order, its last element ending up nearest the top. Ids already on
    /// the deck, or repeated within the batch, are skipped.
    pub fn load(&mut self, batch: Vec<Candidate>) {
        let fetched = batch.len();
        let mut seen: HashSet<CandidateId> = self.cards.iter().map(|c| c.id.clone()).collect();
        let mut fresh: Vec<Candidate> = batch.into_iter().filter(|c| seen.insert(c.id.clone())).collect();
        debug!("[DECK] Loaded {} candidates ({} new)", fetched, fresh.len());
        fresh.append(&mut self.cards);
        self.cards = fresh;
        self.status = if self.cards.is_empty() { DeckStatus::NoEligible } else { DeckStatus::Active };
    }

    pub fn top_candidate(&self) -> Option<&Candidate> {
        self.cards.last()
    }

    pub fn is_top(&self, id: &CandidateId) -> bool {
        self.top_candidate().map(|c| &c.id == id).unwrap_or(false)
    }

    pub fn get(&self, id: &CandidateId) -> Option<&Candidate> {
        self.cards.iter().find(|c| &c.id == id)
    }

    pub fn contains(&self, id: &CandidateId) -> bool {
        self.get(id).is_some()
    }

    /// Removes a candidate. Unknown ids are a no-op, so overlapping match and
    /// dismiss paths can both call this safely. Returns whether anything was
    /// removed.
    pub fn remove_candidate(&mut self, id: &CandidateId) -> bool {
        let Some(pos) = self.cards.iter().position(|c| &c.id == id) else {
            debug!("[DECK] Remove of {} ignored, not on deck", id);
            return false;
        };
        self.cards.remove(pos);
        if self.cards.is_empty() {
            self.status = DeckStatus::Exhausted;
        }
        debug!("[DECK] Removed {}, {} left", id, self.cards.len());
        true
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn status(&self) -> DeckStatus {
        self.status
    }

    /// Candidates in presentation order (last = top).
    pub fn candidates(&self) -> &[Candidate] {
        &self.cards
    }

    pub fn ids(&self) -> Vec<CandidateId> {
        self.cards.iter().map(|c| c.id.clone()).collect()
    }

    /// Layers bottom to top. Only the last one is interactive.
    pub fn layers(&self) -> Vec<CardLayer> {
        let len = self.cards.len();
        self.cards
            .iter()
            .enumerate()
            .map(|(index, candidate)| {
                let index_from_top = len - 1 - index;
                let depth = MAX_DEPTH.saturating_sub(index_from_top);
                let sink = (MAX_DEPTH - depth) as f64;
                CardLayer {
                    candidate_id: candidate.id.clone(),
                    index_from_top,
                    depth,
                    scale: (1.0 - sink * SCALE_STEP).max(MIN_SCALE),
                    translate_y: (sink * OFFSET_STEP).min(MAX_OFFSET),
                    interactive: index_from_top == 0,
                }
            })
            .collect()
    }
}
