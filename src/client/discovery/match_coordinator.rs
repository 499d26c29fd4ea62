use std::collections::{HashSet, VecDeque};

use log::{debug, info};

use crate::client::discovery::deck::DeckController;
use crate::common::models::{Candidate, CandidateId, Match, MatchId};

/// "It's a match" state for one candidate, shown until the user dismisses it
/// or chooses to send a message.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCelebration {
    pub candidate: Candidate,
    /// The match record, when the like response carried one.
    pub matched: Option<Match>,
}

/// Where the user goes after a celebration ends through "send message".
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTarget {
    pub candidate: Candidate,
    pub match_id: Option<MatchId>,
}

/// Presents match celebrations one at a time, FIFO. Ending a celebration
/// removes its candidate from the deck; the removal is idempotent, so a
/// candidate already gone is fine.
#[derive(Debug, Default)]
pub struct MatchCoordinator {
    active: Option<MatchCelebration>,
    queue: VecDeque<MatchCelebration>,
    /// Candidates whose celebration already ended; never celebrated again.
    resolved: HashSet<CandidateId>,
}

impl MatchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a celebration. Returns false for a candidate that is already
    /// showing, queued, or was resolved before.
    pub fn present(&mut self, candidate: Candidate, matched: Option<Match>) -> bool {
        let id = &candidate.id;
        if self.resolved.contains(id) || self.is_celebrating(id) {
            debug!("[MATCH] Ignoring repeated match for {}", id);
            return false;
        }
        info!("[MATCH] It's a match with {} ({})", candidate.name, id);
        let celebration = MatchCelebration { candidate, matched };
        if self.active.is_none() {
            self.active = Some(celebration);
        } else {
            self.queue.push_back(celebration);
        }
        true
    }

    pub fn active(&self) -> Option<&MatchCelebration> {
        self.active.as_ref()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_celebrating(&self, id: &CandidateId) -> bool {
        self.active.iter().chain(self.queue.iter()).any(|c| &c.candidate.id == id)
    }

    /// "Keep swiping". No-op when nothing is showing.
    pub fn dismiss(&mut self, deck: &mut DeckController) -> Option<MatchCelebration> {
        self.finish(deck)
    }

    /// "Send message": same as dismiss, plus where to navigate.
    pub fn send_message(&mut self, deck: &mut DeckController) -> Option<ChatTarget> {
        self.finish(deck).map(|celebration| ChatTarget {
            match_id: celebration.matched.as_ref().map(|m| m.id.clone()),
            candidate: celebration.candidate,
        })
    }

    /// Ends every pending celebration, removing their candidates. Used when
    /// the discovery view closes so no deck entry is left behind.
    pub fn drain(&mut self, deck: &mut DeckController) -> usize {
        let mut ended = 0;
        while self.finish(deck).is_some() {
            ended += 1;
        }
        ended
    }

    fn finish(&mut self, deck: &mut DeckController) -> Option<MatchCelebration> {
        let celebration = self.active.take()?;
        deck.remove_candidate(&celebration.candidate.id);
        self.resolved.insert(celebration.candidate.id.clone());
        self.active = self.queue.pop_front();
        Some(celebration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str) -> Candidate {
        Candidate {
            id: id.into(),
            name: id.to_uppercase(),
            age: 25,
            photos: Vec::new(),
            bio: String::new(),
            interests: Default::default(),
            distance: 0.0,
            premium: false,
        }
    }

    fn deck(ids: &[&str]) -> DeckController {
        let mut deck = DeckController::new();
        deck.load(ids.iter().map(|id| candidate(id)).collect());
        deck
    }

    #[test]
    fn dismiss_removes_once_and_second_call_is_noop() {
        let mut deck = deck(&["a", "b"]);
        let mut matches = MatchCoordinator::new();
        assert!(matches.present(candidate("b"), None));
        assert!(deck.contains(&"b".into()));

        let ended = matches.dismiss(&mut deck).unwrap();
        assert_eq!(ended.candidate.id.as_str(), "b");
        assert!(!deck.contains(&"b".into()));
        assert_eq!(deck.len(), 1);

        assert!(matches.dismiss(&mut deck).is_none());
        assert!(matches.send_message(&mut deck).is_none());
        assert_eq!(deck.len(), 1);
    }

    #[test]
    fn send_message_removes_and_targets_chat() {
        let mut deck = deck(&["a", "b"]);
        let mut matches = MatchCoordinator::new();
        matches.present(candidate("b"), None);
        let target = matches.send_message(&mut deck).unwrap();
        assert_eq!(target.candidate.id.as_str(), "b");
        assert_eq!(target.match_id, None);
        assert_eq!(deck.ids(), vec![CandidateId::from("a")]);
    }

    #[test]
    fn overlapping_matches_are_fifo() {
        let mut deck = deck(&["a", "b", "c"]);
        let mut matches = MatchCoordinator::new();
        matches.present(candidate("c"), None);
        matches.present(candidate("b"), None);
        assert_eq!(matches.queued(), 1);
        assert_eq!(matches.active().unwrap().candidate.id.as_str(), "c");

        matches.dismiss(&mut deck);
        assert_eq!(matches.active().unwrap().candidate.id.as_str(), "b");
        matches.dismiss(&mut deck);
        assert!(matches.active().is_none());
        assert_eq!(deck.ids(), vec![CandidateId::from("a")]);
    }

    #[test]
    fn resolved_candidate_is_not_celebrated_again() {
        let mut deck = deck(&["a"]);
        let mut matches = MatchCoordinator::new();
        assert!(matches.present(candidate("a"), None));
        assert!(!matches.present(candidate("a"), None));
        matches.dismiss(&mut deck);
        assert!(!matches.present(candidate("a"), None));
        assert!(matches.active().is_none());
    }

    #[test]
    fn drain_clears_queue_and_deck_entries() {
        let mut deck = deck(&["a", "b", "c"]);
        let mut matches = MatchCoordinator::new();
        matches.present(candidate("c"), None);
        matches.present(candidate("b"), None);
        assert_eq!(matches.drain(&mut deck), 2);
        assert_eq!(deck.ids(), vec![CandidateId::from("a")]);
    }
}
