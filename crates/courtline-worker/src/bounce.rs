//! Bounce decision state machine.
//!
//! Keeps the last `window` ball positions of a stream. Until the window is
//! full the verdict is `UNKNOWN`. Once full, each new position produces a
//! normalised window for the bounce classifier; a probability above the
//! threshold declares a bounce and the newest position is tested against the
//! court zones. Without a bounce the previous verdict is kept.

use std::collections::VecDeque;

use courtline_models::{BallPosition, CourtZones, Verdict};

/// Added to each axis range so a window of identical points normalises to 0.
const NORMALIZE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BouncePhase {
    InsufficientData,
    Classifying,
}

#[derive(Debug, Clone)]
pub struct BounceTracker {
    history: VecDeque<BallPosition>,
    window: usize,
    threshold: f32,
    verdict: Verdict,
}

impl BounceTracker {
    pub fn new(window: usize, threshold: f32) -> Self {
        let window = window.max(1);
        Self {
            history: VecDeque::with_capacity(window),
            window,
            threshold,
            verdict: Verdict::Unknown,
        }
    }

    pub fn phase(&self) -> BouncePhase {
        if self.history.len() < self.window {
            BouncePhase::InsufficientData
        } else {
            BouncePhase::Classifying
        }
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn latest(&self) -> Option<BallPosition> {
        self.history.back().copied()
    }

    /// Window the classifier should see if `ball` were recorded.
    ///
    /// Leaves the history untouched; `None` means no classification this
    /// frame (no detection, or the window would still be short).
    pub fn candidate_window(&self, ball: Option<BallPosition>) -> Option<Vec<[f32; 2]>> {
        let ball = ball?;
        let keep = self.window - 1;
        if self.history.len() < keep {
            return None;
        }

        let mut points: Vec<BallPosition> = self
            .history
            .iter()
            .skip(self.history.len() - keep)
            .copied()
            .collect();
        points.push(ball);
        Some(normalize_window(&points))
    }

    /// Append this frame's detection and fold the classifier result into
    /// the verdict.
    pub fn record(
        &mut self,
        ball: Option<BallPosition>,
        probability: Option<f32>,
        zones: &CourtZones,
    ) -> Verdict {
        if let Some(ball) = ball {
            if self.history.len() == self.window {
                self.history.pop_front();
            }
            self.history.push_back(ball);
        }

        if self.phase() == BouncePhase::InsufficientData {
            return Verdict::Unknown;
        }

        if let (Some(p), Some(latest)) = (probability, self.latest()) {
            if p > self.threshold {
                self.verdict = if zones.contains(latest) {
                    Verdict::In
                } else {
                    Verdict::Out
                };
            }
        }
        self.verdict
    }
}

/// Min-max normalise each axis over the window itself.
pub fn normalize_window(points: &[BallPosition]) -> Vec<[f32; 2]> {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    let range_x = max_x - min_x + NORMALIZE_EPSILON;
    let range_y = max_y - min_y + NORMALIZE_EPSILON;
    points
        .iter()
        .map(|p| {
            [
                ((p.x - min_x) / range_x) as f32,
                ((p.y - min_y) / range_y) as f32,
            ]
        })
        .collect()
}
