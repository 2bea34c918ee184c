//! Card table animation queue
//!
//! Steps run strictly one at a time: each frame the front step is advanced
//! and popped once it completes. Every step reports whether the table needs
//! to be redrawn; the AI delay always does, even while it is still waiting.

use crate::cards::Card;
use hearth_engine::foundation::math::{utils, Vec2};
use std::collections::VecDeque;

/// One queued animation
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationStep {
    /// Slide a card between two table positions
    MoveCard {
        /// Card being moved
        card: Card,
        /// Start position in pixels
        from: Vec2,
        /// End position in pixels
        to: Vec2,
        /// Total duration in seconds
        duration: f32,
        /// Time spent so far
        elapsed: f32,
    },
    /// Turn a card over in place
    FlipCard {
        /// Card being flipped
        card: Card,
        /// Side showing once the flip completes
        face_up: bool,
        /// Total duration in seconds
        duration: f32,
        /// Time spent so far
        elapsed: f32,
    },
    /// The computer is "thinking"
    AiDelay {
        /// Seconds left
        remaining: f32,
    },
    /// Hold the table still, e.g. to show a hand result
    Pause {
        /// Seconds left
        remaining: f32,
    },
}

/// Progress of a step after advancing it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepProgress {
    /// The step finished this frame
    pub done: bool,
    /// The table changed and has to be redrawn
    pub needs_redraw: bool,
}

impl AnimationStep {
    /// Slide `card` from `from` to `to`
    pub fn move_card(card: Card, from: Vec2, to: Vec2, duration: f32) -> Self {
        AnimationStep::MoveCard {
            card,
            from,
            to,
            duration,
            elapsed: 0.0,
        }
    }

    /// Flip `card` so that `face_up` shows at the end
    pub fn flip_card(card: Card, face_up: bool, duration: f32) -> Self {
        AnimationStep::FlipCard {
            card,
            face_up,
            duration,
            elapsed: 0.0,
        }
    }

    /// Advance the step by `dt` seconds
    pub fn advance(&mut self, dt: f32) -> StepProgress {
        match self {
            AnimationStep::MoveCard { duration, elapsed, .. } | AnimationStep::FlipCard { duration, elapsed, .. } => {
                *elapsed = (*elapsed + dt).min(*duration);
                StepProgress {
                    done: *elapsed >= *duration,
                    needs_redraw: true,
                }
            }
            AnimationStep::AiDelay { remaining } => {
                *remaining -= dt;
                StepProgress {
                    done: *remaining <= 0.0,
                    needs_redraw: true,
                }
            }
            AnimationStep::Pause { remaining } => {
                *remaining -= dt;
                let done = *remaining <= 0.0;
                StepProgress { done, needs_redraw: done }
            }
        }
    }

    /// Completion in `[0, 1]`
    pub fn progress(&self) -> f32 {
        match self {
            AnimationStep::MoveCard { duration, elapsed, .. } | AnimationStep::FlipCard { duration, elapsed, .. } => {
                if *duration <= 0.0 {
                    1.0
                } else {
                    (*elapsed / *duration).clamp(0.0, 1.0)
                }
            }
            AnimationStep::AiDelay { remaining } | AnimationStep::Pause { remaining } => {
                if *remaining <= 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Card animated by this step
    pub fn card(&self) -> Option<Card> {
        match self {
            AnimationStep::MoveCard { card, .. } | AnimationStep::FlipCard { card, .. } => Some(*card),
            AnimationStep::AiDelay { .. } | AnimationStep::Pause { .. } => None,
        }
    }

    /// Current position of a moving card, eased
    pub fn position(&self) -> Option<Vec2> {
        match self {
            AnimationStep::MoveCard { from, to, .. } => {
                let t = utils::smoothstep(self.progress());
                Some(from + (to - from) * t)
            }
            _ => None,
        }
    }

    /// Horizontal scale of a flipping card: shrinks to zero, then grows back
    pub fn flip_scale(&self) -> Option<f32> {
        match self {
            AnimationStep::FlipCard { .. } => Some((1.0 - 2.0 * self.progress()).abs()),
            _ => None,
        }
    }

    /// Which side of a flipping card shows right now
    pub fn showing_face(&self) -> Option<bool> {
        match self {
            AnimationStep::FlipCard { face_up, .. } => {
                Some(if self.progress() < 0.5 { !*face_up } else { *face_up })
            }
            _ => None,
        }
    }
}

/// Result of one queue update
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationUpdate {
    /// The table has to be redrawn this frame
    pub needs_redraw: bool,
    /// Step popped this frame
    pub completed: Option<AnimationStep>,
}

/// FIFO of animation steps
#[derive(Debug, Clone, Default)]
pub struct AnimationQueue {
    steps: VecDeque<AnimationStep>,
}

impl AnimationQueue {
    /// Empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step
    pub fn push(&mut self, step: AnimationStep) {
        self.steps.push_back(step);
    }

    /// Step currently playing
    pub fn front(&self) -> Option<&AnimationStep> {
        self.steps.front()
    }

    /// Whether nothing is playing
    pub fn is_idle(&self) -> bool {
        self.steps.is_empty()
    }

    /// Queued steps, including the one playing
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps in playing order, the front step first
    pub fn iter(&self) -> impl Iterator<Item = &AnimationStep> {
        self.steps.iter()
    }

    /// Whether `card` is waiting in or playing from the queue
    pub fn animates(&self, card: Card) -> bool {
        self.steps.iter().any(|step| step.card() == Some(card))
    }

    /// Advance the front step; pop it when it completes
    pub fn update(&mut self, dt: f32) -> AnimationUpdate {
        let Some(front) = self.steps.front_mut() else {
            return AnimationUpdate {
                needs_redraw: false,
                completed: None,
            };
        };

        let progress = front.advance(dt);
        let completed = if progress.done { self.steps.pop_front() } else { None };
        AnimationUpdate {
            needs_redraw: progress.needs_redraw,
            completed,
        }
    }

    /// Drop every step
    pub fn clear(&mut self) {
        self.steps.clear();
    }
}
