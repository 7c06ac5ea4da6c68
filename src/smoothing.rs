//! Temporal smoothing
//!
//! Bounded rolling windows that damp single-frame detector noise. Posture uses
//! a rolling mean of the last few scores plus an unbounded lifetime average for
//! the session record; focus uses a majority vote over the last few frames.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Rolling window of posture scores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostureWindow {
    /// Most recent raw scores, oldest first
    values: VecDeque<f64>,
    /// Maximum window size
    window_size: usize,
}

impl PostureWindow {
    /// Create a new window holding at most `window_size` samples
    pub fn new(window_size: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(window_size),
            window_size: window_size.max(1),
        }
    }

    /// Add a raw score and return the new rolling average
    pub fn push(&mut self, score: f64) -> f64 {
        self.values.push_back(score);
        while self.values.len() > self.window_size {
            self.values.pop_front();
        }
        self.average().unwrap_or(score)
    }

    /// Arithmetic mean of the current contents
    pub fn average(&self) -> Option<f64> {
        rolling_average(&self.values)
    }

    /// Rolling average rounded to one decimal, as displayed live
    pub fn display_average(&self) -> Option<f64> {
        self.average().map(round_one_decimal)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Running sum/count over every posture sample of a session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifetimeAverage {
    sum: f64,
    count: u64,
}

impl LifetimeAverage {
    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(self.sum / self.count as f64)
    }

    /// Session average rounded to one decimal
    pub fn display_average(&self) -> Option<f64> {
        self.average().map(round_one_decimal)
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Majority vote over the last few focus classifications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusVote {
    /// Most recent raw classifications, oldest first
    votes: VecDeque<bool>,
    /// Maximum window size
    window_size: usize,
}

impl FocusVote {
    /// Create a new vote window holding at most `window_size` frames
    pub fn new(window_size: usize) -> Self {
        Self {
            votes: VecDeque::with_capacity(window_size),
            window_size: window_size.max(1),
        }
    }

    /// Add a raw classification and return the smoothed state
    pub fn push(&mut self, focused: bool) -> bool {
        self.votes.push_back(focused);
        while self.votes.len() > self.window_size {
            self.votes.pop_front();
        }
        self.smoothed()
    }

    /// True iff at least half of the window is focused (ties count as focused).
    ///
    /// An empty window is not focused.
    pub fn smoothed(&self) -> bool {
        if self.votes.is_empty() {
            return false;
        }
        let focused = self.votes.iter().filter(|v| **v).count();
        focused * 2 >= self.votes.len()
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}

/// Calculate rolling average of a queue
fn rolling_average(queue: &VecDeque<f64>) -> Option<f64> {
    if queue.is_empty() {
        return None;
    }
    let sum: f64 = queue.iter().sum();
    Some(sum / queue.len() as f64)
}

/// Round half away from zero to one decimal place
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
