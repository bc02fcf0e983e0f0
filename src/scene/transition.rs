//! Fade transition for swapping object content
//!
//! An object fades to zero alpha, swaps its content while invisible, then
//! fades back in. Alpha is an integer in 0..=255 moved by a fixed step per
//! `update()`; the step can be derived from a duration hint.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fully opaque alpha
pub const FULL_ALPHA: i32 = 255;

/// Alpha change per update when no duration hint is given
pub const DEFAULT_FADE_STEP: i32 = 10;

/// Update rate used to turn a duration hint into a step size
pub const ASSUMED_FRAME_RATE: f64 = 60.0;

/// Where the transition currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeState {
    /// alpha == target
    Idle,
    /// Moving toward zero, content swap pending
    FadingOut,
    /// Moving back toward full alpha
    FadingIn,
}

/// Result of one transition step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FadeStep {
    /// Nothing to do
    Idle,
    /// Alpha moved by one step
    Stepped,
    /// Alpha reached zero; load this content now, fading in follows
    SwapContent(PathBuf),
    /// Alpha reached full opacity
    FadedIn,
}

/// Per-object fade state machine
#[derive(Debug, Clone)]
pub struct FadeTransition {
    alpha: i32,
    target: i32,
    step: i32,
    pending: Option<PathBuf>,
}

impl Default for FadeTransition {
    fn default() -> Self {
        Self {
            alpha: FULL_ALPHA,
            target: FULL_ALPHA,
            step: DEFAULT_FADE_STEP,
            pending: None,
        }
    }
}

impl FadeTransition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to fully opaque, idle, default step
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn state(&self) -> FadeState {
        match self.target.cmp(&self.alpha) {
            std::cmp::Ordering::Equal => FadeState::Idle,
            std::cmp::Ordering::Less => FadeState::FadingOut,
            std::cmp::Ordering::Greater => FadeState::FadingIn,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state() == FadeState::Idle
    }

    pub fn alpha(&self) -> i32 {
        self.alpha
    }

    pub fn target(&self) -> i32 {
        self.target
    }

    pub fn step_size(&self) -> i32 {
        self.step
    }

    /// Alpha as a 0..1 float for the tint
    pub fn opacity(&self) -> f32 {
        self.alpha as f32 / FULL_ALPHA as f32
    }

    /// Content that will load when alpha reaches zero
    pub fn pending(&self) -> Option<&Path> {
        self.pending.as_deref()
    }

    /// Set the alpha change per update (clamped to 1..=255)
    pub fn set_step(&mut self, step: i32) {
        self.step = step.clamp(1, FULL_ALPHA);
    }

    /// Step size that covers 0..=255 in roughly `duration` at
    /// [`ASSUMED_FRAME_RATE`] updates per second
    pub fn step_for_duration(duration: Duration) -> i32 {
        let updates = (duration.as_secs_f64() * ASSUMED_FRAME_RATE).round().max(1.0);
        ((FULL_ALPHA as f64 / updates).ceil() as i32).clamp(1, FULL_ALPHA)
    }

    /// Start fading out toward a content swap.
    ///
    /// Calling again before the swap replaces the pending content and
    /// restarts the fade-out from the current alpha.
    pub fn fade_out_to(&mut self, next: impl Into<PathBuf>, duration_hint: Option<Duration>) {
        if let Some(duration) = duration_hint {
            self.step = Self::step_for_duration(duration);
        }
        self.pending = Some(next.into());
        self.target = 0;
    }

    /// Drop the pending swap and fade back in.
    ///
    /// Returns false if no swap was pending.
    pub fn cancel(&mut self) -> bool {
        if self.pending.take().is_none() {
            return false;
        }
        self.target = FULL_ALPHA;
        true
    }

    /// Advance one update.
    pub fn step(&mut self) -> FadeStep {
        match self.state() {
            FadeState::Idle => FadeStep::Idle,
            FadeState::FadingOut => {
                if self.alpha - self.target <= self.step {
                    self.alpha = self.target;
                    self.target = FULL_ALPHA;
                    match self.pending.take() {
                        Some(next) => FadeStep::SwapContent(next),
                        None => FadeStep::Stepped,
                    }
                } else {
                    self.alpha -= self.step;
                    FadeStep::Stepped
                }
            }
            FadeState::FadingIn => {
                if self.target - self.alpha <= self.step {
                    self.alpha = self.target;
                    FadeStep::FadedIn
                } else {
                    self.alpha += self.step;
                    FadeStep::Stepped
                }
            }
        }
    }
}
