//! Highlight state and animated level transitions
//!
//! A transition interpolates from a "before" snapshot to an "after" target.
//! The host drives it through the [`Interpolate`] interface, either with a
//! [`Timeline`] ticking on frame time or by supplying alpha values directly.

/// Default length of a highlight transition in seconds
pub const DEFAULT_TRANSITION_DURATION: f32 = 0.5;

/// Something that animates between two snapshots
pub trait Interpolate {
    /// Enter the transitioning state
    fn start(&mut self);
    /// Apply the interpolation at `alpha` in `[0, 1]`
    fn update(&mut self, alpha: f32);
    /// Leave the transitioning state with the target values in place
    fn finish(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionState {
    #[default]
    Default,
    Transitioning,
}

/// Node level scales for the three highlight situations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelScales {
    pub default: f32,
    pub highlighted: f32,
    pub neighbor_highlighted: f32,
}

impl Default for LevelScales {
    fn default() -> Self {
        Self {
            default: 1.0,
            highlighted: 0.5,
            neighbor_highlighted: 0.75,
        }
    }
}

/// Per-node highlight flags and animated level scale
#[derive(Debug, Clone, PartialEq)]
pub struct NodeHighlight {
    pub highlighted: bool,
    /// Highlighted neighbors, reference counted
    pub num_highlighted_neighbors: u32,
    pub level_scale: f32,
    pub level_scale_before: f32,
    pub level_scale_after: f32,
    pub state: TransitionState,
}

impl NodeHighlight {
    pub fn new(default_level_scale: f32) -> Self {
        Self {
            highlighted: false,
            num_highlighted_neighbors: 0,
            level_scale: default_level_scale,
            level_scale_before: default_level_scale,
            level_scale_after: default_level_scale,
            state: TransitionState::Default,
        }
    }

    pub fn has_highlighted_neighbor(&self) -> bool {
        self.num_highlighted_neighbors > 0
    }

    fn is_plain(&self) -> bool {
        !(self.highlighted || self.has_highlighted_neighbor())
    }

    pub fn begin_highlighted(&mut self, scales: &LevelScales) {
        self.highlighted = true;
        self.level_scale_after = scales.highlighted;
    }

    pub fn end_highlighted(&mut self, scales: &LevelScales) {
        self.highlighted = false;
        self.level_scale_after = if self.has_highlighted_neighbor() {
            scales.neighbor_highlighted
        } else {
            scales.default
        };
    }

    /// Count a newly highlighted neighbor. Returns whether the node's target
    /// scale changed, which only happens when leaving the plain state.
    pub fn begin_neighbor_highlighted(&mut self, scales: &LevelScales) -> bool {
        let required = self.is_plain();
        self.num_highlighted_neighbors += 1;
        if required {
            self.level_scale_after = scales.neighbor_highlighted;
        }
        required
    }

    /// Release a highlighted neighbor. Returns whether the node's target
    /// scale changed, which only happens when returning to the plain state.
    pub fn end_neighbor_highlighted(&mut self, scales: &LevelScales) -> bool {
        debug_assert!(self.num_highlighted_neighbors > 0, "unbalanced neighbor highlight");
        self.num_highlighted_neighbors = self.num_highlighted_neighbors.saturating_sub(1);
        let required = self.is_plain();
        if required {
            self.level_scale_after = scales.default;
        }
        required
    }

    /// Snapshot the current scale as the transition start
    pub fn begin_transition(&mut self) {
        self.level_scale_before = self.level_scale;
    }
}

impl Interpolate for NodeHighlight {
    fn start(&mut self) {
        self.state = TransitionState::Transitioning;
    }

    fn update(&mut self, alpha: f32) {
        self.state = TransitionState::Transitioning;
        self.level_scale =
            self.level_scale_before + (self.level_scale_after - self.level_scale_before) * alpha;
    }

    fn finish(&mut self) {
        self.level_scale = self.level_scale_after;
        self.state = TransitionState::Default;
    }
}

/// One tick of a [`Timeline`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimelineStep {
    Idle,
    Update(f32),
    Finished,
}

impl TimelineStep {
    /// Forward this step to an interpolation target. A finished timeline
    /// applies alpha 1 before finishing.
    pub fn apply<I: Interpolate + ?Sized>(self, target: &mut I) {
        match self {
            TimelineStep::Idle => {}
            TimelineStep::Update(alpha) => target.update(alpha),
            TimelineStep::Finished => {
                target.update(1.0);
                target.finish();
            }
        }
    }
}

/// Fixed-duration alpha source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeline {
    duration: f32,
    elapsed: Option<f32>,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSITION_DURATION)
    }
}

impl Timeline {
    pub fn new(duration: f32) -> Self {
        Self {
            duration: duration.max(0.0),
            elapsed: None,
        }
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn is_playing(&self) -> bool {
        self.elapsed.is_some()
    }

    /// Restart from alpha 0
    pub fn play_from_start(&mut self) {
        self.elapsed = Some(0.0);
    }

    pub fn stop(&mut self) {
        self.elapsed = None;
    }

    pub fn advance(&mut self, dt: f32) -> TimelineStep {
        let Some(elapsed) = self.elapsed else {
            return TimelineStep::Idle;
        };
        let elapsed = elapsed + dt.max(0.0);
        if elapsed >= self.duration {
            self.elapsed = None;
            TimelineStep::Finished
        } else {
            self.elapsed = Some(elapsed);
            TimelineStep::Update(elapsed / self.duration)
        }
    }
}
