use std::time::Instant;

use log::{debug, info, warn};

use crate::client::config::ClientConfig;
use crate::client::discovery::deck::{CardLayer, DeckController, DeckStatus};
use crate::client::discovery::dispatcher::{ActionDispatcher, Dispatch, PendingLike, Resolution};
use crate::client::discovery::gesture::{
    BadgeOpacity, CardTransform, GestureConfig, GestureRelease, GestureTracker, Point, SwipeOutcome,
};
use crate::client::discovery::match_coordinator::{ChatTarget, MatchCelebration, MatchCoordinator};
use crate::client::error::ApiError;
use crate::client::services::api_client::{DiscoveryApi, DiscoveryFilters};
use crate::common::models::{Candidate, CandidateId, LikeResult, Match};

/// The three buttons under the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionButton {
    Pass,
    SuperLike,
    Like,
}

impl From<ActionButton> for SwipeOutcome {
    fn from(button: ActionButton) -> Self {
        match button {
            ActionButton::Pass => SwipeOutcome::Pass,
            ActionButton::SuperLike => SwipeOutcome::SuperLike,
            ActionButton::Like => SwipeOutcome::Like,
        }
    }
}

/// What a completed swipe or button press did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwipeResult {
    Ignored,
    Reset,
    Passed(CandidateId),
    Resolved(Resolution),
}

/// Discovery screen state: deck, gesture, pending likes and match modal.
///
/// Long-running work is exposed two ways. `swipe`/`press` await the like
/// request while holding the view; `begin_swipe`/`complete_like` let the
/// caller run the request elsewhere and feed the result back, which is the
/// path where `close` can race a response.
pub struct DiscoveryView<A> {
    api: A,
    filters: DiscoveryFilters,
    deck: DeckController,
    tracker: GestureTracker,
    dispatcher: ActionDispatcher,
    matches: MatchCoordinator,
    selected: Option<CandidateId>,
    notice: Option<String>,
    closed: bool,
}

impl<A: DiscoveryApi> DiscoveryView<A> {
    pub fn new(api: A, config: &ClientConfig) -> Self {
        Self {
            api,
            filters: config.filters,
            deck: DeckController::new(),
            tracker: GestureTracker::new(config.gesture),
            dispatcher: ActionDispatcher::new(config.ack_duration),
            matches: MatchCoordinator::new(),
            selected: None,
            notice: None,
            closed: false,
        }
    }

    pub fn with_gesture(mut self, gesture: GestureConfig) -> Self {
        self.tracker = GestureTracker::new(gesture);
        self
    }

    pub fn set_filters(&mut self, filters: DiscoveryFilters) {
        self.filters = filters;
    }

    /// Fetches a batch with the current filters and puts it under the deck.
    pub async fn load(&mut self) -> Result<DeckStatus, ApiError> {
        if self.closed {
            return Ok(self.deck.status());
        }
        match self.api.fetch_candidates(&self.filters).await {
            Ok(batch) => {
                self.deck.load(batch);
                info!("[DECK] Deck ready: {} cards, {:?}", self.deck.len(), self.deck.status());
                Ok(self.deck.status())
            }
            Err(e) => {
                warn!("[DECK] Could not load candidates: {}", e);
                self.notice = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Starts a drag on the top card. Ignored while a match is being celebrated.
    pub fn pointer_down(&mut self, point: Point) -> bool {
        if self.closed || self.matches.active().is_some() {
            return false;
        }
        let on_top = self.deck.top_candidate().is_some();
        self.tracker.on_start(point, on_top)
    }

    pub fn pointer_move(&mut self, point: Point) -> Option<CardTransform> {
        self.tracker.on_move(point)
    }

    /// Releases the drag. A tap opens the top card; a swipe is returned for
    /// the caller to hand to `swipe` or `begin_swipe`.
    pub fn pointer_up(&mut self) -> Option<GestureRelease> {
        let release = self.tracker.on_end()?;
        if release == GestureRelease::Tap {
            self.selected = self.deck.top_candidate().map(|c| c.id.clone());
            debug!("[DECK] Opened card {:?}", self.selected);
        }
        Some(release)
    }

    pub fn pointer_cancel(&mut self) {
        self.tracker.cancel();
    }

    /// Synchronous half of an action on the top card. A like comes back as
    /// `Dispatch::Pending` to be submitted and then passed to `complete_like`.
    pub fn begin_swipe(&mut self, outcome: SwipeOutcome) -> Dispatch {
        if self.closed {
            return Dispatch::Ignored;
        }
        let Some(top) = self.deck.top_candidate().map(|c| c.id.clone()) else {
            return Dispatch::Ignored;
        };
        if self.matches.is_celebrating(&top) {
            return Dispatch::Ignored;
        }
        let dispatch = self.dispatcher.dispatch(&top, outcome, &mut self.deck, Instant::now());
        if let Dispatch::Passed(_) = dispatch {
            self.clear_selection(&top);
        }
        dispatch
    }

    /// Applies a like response. Responses that arrive after `close` are dropped.
    pub fn complete_like(&mut self, pending: PendingLike, result: Result<LikeResult, ApiError>) -> Resolution {
        let resolution = self.dispatcher.resolve(pending, result, &mut self.deck, &mut self.matches);
        match &resolution {
            Resolution::Recorded(id) | Resolution::Matched(id) => self.clear_selection(id),
            Resolution::Failed { message, .. } => self.notice = Some(message.clone()),
            Resolution::Stale(_) => {}
        }
        resolution
    }

    /// Full action flow for one swipe outcome on the top card.
    pub async fn swipe(&mut self, outcome: SwipeOutcome) -> SwipeResult {
        match self.begin_swipe(outcome) {
            Dispatch::Ignored => SwipeResult::Ignored,
            Dispatch::Reset => SwipeResult::Reset,
            Dispatch::Passed(id) => SwipeResult::Passed(id),
            Dispatch::Pending(pending) => {
                let result = ActionDispatcher::submit(&self.api, &pending).await;
                SwipeResult::Resolved(self.complete_like(pending, result))
            }
        }
    }

    /// Button press: same flow as a swipe, without a gesture.
    pub async fn press(&mut self, button: ActionButton) -> SwipeResult {
        if self.tracker.is_dragging() || self.matches.active().is_some() {
            return SwipeResult::Ignored;
        }
        self.swipe(button.into()).await
    }

    pub fn dismiss_match(&mut self) -> Option<MatchCelebration> {
        self.matches.dismiss(&mut self.deck)
    }

    pub fn send_message_to_match(&mut self) -> Option<ChatTarget> {
        self.matches.send_message(&mut self.deck)
    }

    pub async fn matches(&self) -> Result<Vec<Match>, ApiError> {
        self.api.fetch_matches().await
    }

    /// Tears the view down. Pending likes resolve as stale and leave the
    /// deck alone; queued celebrations are ended.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.tracker.cancel();
        self.dispatcher.invalidate();
        let ended = self.matches.drain(&mut self.deck);
        info!("[DECK] Discovery closed ({} celebrations ended)", ended);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn deck(&self) -> &DeckController {
        &self.deck
    }

    pub fn layers(&self) -> Vec<CardLayer> {
        self.deck.layers()
    }

    pub fn transform(&self) -> CardTransform {
        self.tracker.transform()
    }

    pub fn badges(&self) -> BadgeOpacity {
        self.tracker.badges()
    }

    /// Acknowledgment badge currently on screen.
    pub fn acknowledgment(&self) -> Option<SwipeOutcome> {
        self.dispatcher.ack().visible(Instant::now())
    }

    pub fn celebration(&self) -> Option<&MatchCelebration> {
        self.matches.active()
    }

    pub fn selected(&self) -> Option<&Candidate> {
        self.selected.as_ref().and_then(|id| self.deck.get(id))
    }

    pub fn close_selected(&mut self) {
        self.selected = None;
    }

    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    fn clear_selection(&mut self, id: &CandidateId) {
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
    }
}
