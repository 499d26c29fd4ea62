//! Pointer/touch tracking for the top card.
//!
//! The tracker only reports: the live offset and rotation while dragging, and a
//! classified release at the end. It never touches the deck.

use crate::common::models::LikeKind;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Offset {
    pub dx: f64,
    pub dy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    /// Distance in pixels a release must clear to count as a swipe.
    pub threshold: f64,
    /// Movement on either axis below this is still a tap.
    pub jitter: f64,
    /// Degrees of rotation for a drag spanning the full viewport width.
    pub rotation_span: f64,
    pub viewport_width: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            threshold: 120.0,
            jitter: 5.0,
            rotation_span: 15.0,
            viewport_width: 390.0,
        }
    }
}

impl GestureConfig {
    /// Degrees per pixel of horizontal offset. Scaled by viewport width so the
    /// rotation stays bounded on any screen size.
    pub fn rotate_factor(&self) -> f64 {
        if self.viewport_width > 0.0 {
            self.rotation_span / self.viewport_width
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwipeOutcome {
    Like,
    Pass,
    SuperLike,
    /// Below threshold; the card animates back and nothing fires.
    Reset,
}

impl SwipeOutcome {
    pub fn like_kind(self) -> Option<LikeKind> {
        match self {
            SwipeOutcome::Like => Some(LikeKind::Like),
            SwipeOutcome::SuperLike => Some(LikeKind::SuperLike),
            SwipeOutcome::Pass | SwipeOutcome::Reset => None,
        }
    }
}

/// Classifies a final offset. Horizontal thresholds are checked before the
/// vertical one, so a diagonal drag clearing both resolves horizontally.
pub fn classify(offset: Offset, threshold: f64) -> SwipeOutcome {
    if offset.dx > threshold {
        SwipeOutcome::Like
    } else if offset.dx < -threshold {
        SwipeOutcome::Pass
    } else if offset.dy < -threshold {
        SwipeOutcome::SuperLike
    } else {
        SwipeOutcome::Reset
    }
}

/// State of one active pointer/touch sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwipeGesture {
    pub origin: Point,
    pub offset: Offset,
    pub rotation: f64,
    pub dragging: bool,
    pub moved: bool,
}

/// What the renderer needs for the top card.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CardTransform {
    pub offset: Offset,
    pub rotation: f64,
}

/// Opacity of the LIKE / NOPE / SUPER overlays while dragging, each in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BadgeOpacity {
    pub like: f64,
    pub nope: f64,
    pub super_like: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureRelease {
    /// Released without moving past the jitter threshold: open the card.
    Tap,
    Swipe(SwipeOutcome),
}

#[derive(Debug, Clone, Default)]
pub struct GestureTracker {
    config: GestureConfig,
    active: Option<SwipeGesture>,
}

impl GestureTracker {
    pub fn new(config: GestureConfig) -> Self {
        Self { config, active: None }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn gesture(&self) -> Option<&SwipeGesture> {
        self.active.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.active.map(|g| g.dragging).unwrap_or(false)
    }

    /// Starts a gesture. Ignored unless the card is the top of the deck, and
    /// while another gesture is still dragging.
    pub fn on_start(&mut self, point: Point, is_top: bool) -> bool {
        if !is_top || self.is_dragging() {
            return false;
        }
        self.active = Some(SwipeGesture {
            origin: point,
            offset: Offset::default(),
            rotation: 0.0,
            dragging: true,
            moved: false,
        });
        true
    }

    pub fn on_move(&mut self, point: Point) -> Option<CardTransform> {
        let rotate_factor = self.config.rotate_factor();
        let jitter = self.config.jitter;
        let gesture = self.active.as_mut().filter(|g| g.dragging)?;

        let dx = point.x - gesture.origin.x;
        let dy = point.y - gesture.origin.y;
        if dx.abs() > jitter || dy.abs() > jitter {
            gesture.moved = true;
        }
        gesture.offset = Offset { dx, dy };
        gesture.rotation = dx * rotate_factor;

        Some(CardTransform { offset: gesture.offset, rotation: gesture.rotation })
    }

    /// Ends the gesture and classifies it. Tap and swipe are exclusive.
    pub fn on_end(&mut self) -> Option<GestureRelease> {
        let gesture = self.active.take().filter(|g| g.dragging)?;
        if !gesture.moved {
            return Some(GestureRelease::Tap);
        }
        Some(GestureRelease::Swipe(classify(gesture.offset, self.config.threshold)))
    }

    /// Drops the gesture without producing an outcome.
    pub fn cancel(&mut self) {
        self.active = None;
    }

    /// Current transform; rest position when no gesture is active.
    pub fn transform(&self) -> CardTransform {
        self.active
            .map(|g| CardTransform { offset: g.offset, rotation: g.rotation })
            .unwrap_or_default()
    }

    pub fn badges(&self) -> BadgeOpacity {
        let Offset { dx, dy } = self.transform().offset;
        let t = self.config.threshold;
        if t <= 0.0 {
            return BadgeOpacity::default();
        }
        BadgeOpacity {
            like: (dx / t).clamp(0.0, 1.0),
            nope: (-dx / t).clamp(0.0, 1.0),
            super_like: (-dy / t).clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drag(tracker: &mut GestureTracker, dx: f64, dy: f64) -> Option<GestureRelease> {
        assert!(tracker.on_start(Point::new(100.0, 300.0), true));
        tracker.on_move(Point::new(100.0 + dx / 2.0, 300.0 + dy / 2.0));
        tracker.on_move(Point::new(100.0 + dx, 300.0 + dy));
        tracker.on_end()
    }

    #[test]
    fn classification_table() {
        let t = 120.0;
        let cases = [
            ((130.0, 0.0), SwipeOutcome::Like),
            ((-130.0, 0.0), SwipeOutcome::Pass),
            ((0.0, -130.0), SwipeOutcome::SuperLike),
            ((50.0, 50.0), SwipeOutcome::Reset),
            ((130.0, -200.0), SwipeOutcome::Like),
            ((-121.0, -500.0), SwipeOutcome::Pass),
            ((0.0, 300.0), SwipeOutcome::Reset),
        ];
        for ((dx, dy), expected) in cases {
            assert_eq!(classify(Offset { dx, dy }, t), expected, "({}, {})", dx, dy);
        }
    }

    #[test]
    fn threshold_is_exclusive() {
        assert_eq!(classify(Offset { dx: 120.0, dy: 0.0 }, 120.0), SwipeOutcome::Reset);
        assert_eq!(classify(Offset { dx: 0.0, dy: -120.0 }, 120.0), SwipeOutcome::Reset);
    }

    #[test]
    fn drag_past_threshold_swipes() {
        let mut tracker = GestureTracker::new(GestureConfig::default());
        assert_eq!(drag(&mut tracker, 150.0, 0.0), Some(GestureRelease::Swipe(SwipeOutcome::Like)));
        assert_eq!(drag(&mut tracker, 0.0, -150.0), Some(GestureRelease::Swipe(SwipeOutcome::SuperLike)));
        assert!(tracker.gesture().is_none());
    }

    #[test]
    fn small_movement_is_a_tap() {
        let mut tracker = GestureTracker::new(GestureConfig::default());
        assert_eq!(drag(&mut tracker, 3.0, -4.0), Some(GestureRelease::Tap));
    }

    #[test]
    fn moved_then_returned_resets_instead_of_tapping() {
        let mut tracker = GestureTracker::new(GestureConfig::default());
        tracker.on_start(Point::new(0.0, 0.0), true);
        tracker.on_move(Point::new(40.0, 0.0));
        tracker.on_move(Point::new(1.0, 0.0));
        assert_eq!(tracker.on_end(), Some(GestureRelease::Swipe(SwipeOutcome::Reset)));
    }

    #[test]
    fn only_top_card_and_one_gesture_at_a_time() {
        let mut tracker = GestureTracker::new(GestureConfig::default());
        assert!(!tracker.on_start(Point::new(0.0, 0.0), false));
        assert!(tracker.on_move(Point::new(50.0, 0.0)).is_none());
        assert!(tracker.on_end().is_none());

        assert!(tracker.on_start(Point::new(0.0, 0.0), true));
        assert!(!tracker.on_start(Point::new(10.0, 10.0), true));
        assert_eq!(tracker.gesture().unwrap().origin, Point::new(0.0, 0.0));
    }

    #[test]
    fn rotation_scales_with_viewport() {
        let narrow = GestureConfig { viewport_width: 300.0, ..GestureConfig::default() };
        let wide = GestureConfig { viewport_width: 1200.0, ..GestureConfig::default() };
        let mut a = GestureTracker::new(narrow);
        let mut b = GestureTracker::new(wide);
        a.on_start(Point::default(), true);
        b.on_start(Point::default(), true);
        let ra = a.on_move(Point::new(300.0, 0.0)).unwrap().rotation;
        let rb = b.on_move(Point::new(1200.0, 0.0)).unwrap().rotation;
        assert!((ra - 15.0).abs() < 1e-9);
        assert!((rb - 15.0).abs() < 1e-9);
    }

    #[test]
    fn cancel_returns_card_to_rest() {
        let mut tracker = GestureTracker::new(GestureConfig::default());
        tracker.on_start(Point::default(), true);
        tracker.on_move(Point::new(200.0, 0.0));
        tracker.cancel();
        assert_eq!(tracker.transform(), CardTransform::default());
        assert!(tracker.on_end().is_none());
    }

    #[test]
    fn badge_opacity_follows_offset() {
        let mut tracker = GestureTracker::new(GestureConfig::default());
        tracker.on_start(Point::default(), true);
        tracker.on_move(Point::new(60.0, -240.0));
        let badges = tracker.badges();
        assert!((badges.like - 0.5).abs() < 1e-9);
        assert_eq!(badges.nope, 0.0);
        assert_eq!(badges.super_like, 1.0);
    }

    #[test]
    fn like_kinds() {
        assert_eq!(SwipeOutcome::SuperLike.like_kind(), Some(LikeKind::SuperLike));
        assert_eq!(SwipeOutcome::Pass.like_kind(), None);
    }
}
