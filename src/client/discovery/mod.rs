pub mod deck;
pub mod dispatcher;
pub mod gesture;
pub mod match_coordinator;
pub mod view;

pub use deck::{CardLayer, DeckController, DeckStatus};
pub use dispatcher::{ActionDispatcher, Dispatch, PendingLike, Resolution};
pub use gesture::{GestureConfig, GestureRelease, GestureTracker, Point, SwipeOutcome};
pub use match_coordinator::{ChatTarget, MatchCelebration, MatchCoordinator};
pub use view::{ActionButton, DiscoveryView, SwipeResult};
