//! One-directional extreme ratchet
//!
//! **Core Rule:** a captured extreme may move further from neutral, never
//! back toward it.
//!
//! Level trackers use it for the peak/trough ladder while armed; the
//! take-profit trail uses it for the best ROE (or indicator extreme) seen
//! since arming.

use serde::{Deserialize, Serialize};

/// Which way "more extreme" points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Higher is more extreme (overbought peaks, best ROE).
    Peak,
    /// Lower is more extreme (oversold troughs).
    Trough,
}

impl Direction {
    /// True when `value` has reached `threshold` in this direction (inclusive).
    pub fn reached(self, value: f64, threshold: f64) -> bool {
        match self {
            Direction::Peak => value >= threshold,
            Direction::Trough => value <= threshold,
        }
    }

    /// True when `a` is strictly more extreme than `b`.
    pub fn beyond(self, a: f64, b: f64) -> bool {
        match self {
            Direction::Peak => a > b,
            Direction::Trough => a < b,
        }
    }

    /// Move `level` back toward neutral by `distance`.
    pub fn retrace(self, level: f64, distance: f64) -> f64 {
        match self {
            Direction::Peak => level - distance,
            Direction::Trough => level + distance,
        }
    }

    /// True when `value` has come back from `extreme` by at least `distance`.
    pub fn retraced(self, value: f64, extreme: f64, distance: f64) -> bool {
        let level = self.retrace(extreme, distance);
        match self {
            Direction::Peak => value <= level,
            Direction::Trough => value >= level,
        }
    }
}

/// Ratchet state for an extreme level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ratchet {
    level: Option<f64>,
    direction: Direction,
}

impl Ratchet {
    pub fn new(direction: Direction) -> Self {
        Self {
            level: None,
            direction,
        }
    }

    pub fn with_initial_level(direction: Direction, level: f64) -> Self {
        Self {
            level: Some(level),
            direction,
        }
    }

    /// Offer a new candidate extreme and return the ratcheted level.
    ///
    /// # Rules
    /// - Peak: level can only rise (max of current and proposed)
    /// - Trough: level can only fall (min of current and proposed)
    /// - If no level exists, initializes to the proposed value
    /// - NaN proposals are ignored
    ///
    /// # Example
    /// ```
    /// use doorstep_core::components::{Direction, Ratchet};
    ///
    /// let mut peak = Ratchet::with_initial_level(Direction::Peak, 80.0);
    /// assert_eq!(peak.apply(84.0), Some(84.0));
    /// // Retracing toward neutral never lowers the captured peak.
    /// assert_eq!(peak.apply(75.0), Some(84.0));
    /// ```
    pub fn apply(&mut self, proposed: f64) -> Option<f64> {
        if proposed.is_nan() {
            return self.level;
        }
        let next = match self.level {
            None => proposed,
            Some(current) if self.direction.beyond(proposed, current) => proposed,
            Some(current) => current,
        };
        self.level = Some(next);
        self.level
    }

    pub fn level(&self) -> Option<f64> {
        self.level
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn clear(&mut self) {
        self.level = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_rises() {
        let mut r = Ratchet::with_initial_level(Direction::Peak, 75.0);
        assert_eq!(r.apply(80.0), Some(80.0));
    }

    #[test]
    fn peak_never_falls() {
        let mut r = Ratchet::with_initial_level(Direction::Peak, 80.0);
        assert_eq!(r.apply(70.0), Some(80.0));
        assert_eq!(r.level(), Some(80.0));
    }

    #[test]
    fn trough_falls() {
        let mut r = Ratchet::with_initial_level(Direction::Trough, 30.0);
        assert_eq!(r.apply(25.0), Some(25.0));
    }

    #[test]
    fn trough_never_rises() {
        let mut r = Ratchet::with_initial_level(Direction::Trough, 25.0);
        assert_eq!(r.apply(40.0), Some(25.0));
    }

    #[test]
    fn first_apply_initializes() {
        let mut r = Ratchet::new(Direction::Trough);
        assert_eq!(r.level(), None);
        assert_eq!(r.apply(33.0), Some(33.0));
    }

    #[test]
    fn nan_is_ignored() {
        let mut r = Ratchet::new(Direction::Peak);
        assert_eq!(r.apply(f64::NAN), None);
        r.apply(10.0);
        assert_eq!(r.apply(f64::NAN), Some(10.0));
    }

    #[test]
    fn clear_then_reinitialize() {
        let mut r = Ratchet::with_initial_level(Direction::Peak, 84.0);
        r.clear();
        assert_eq!(r.level(), None);
        assert_eq!(r.apply(70.0), Some(70.0));
    }

    #[test]
    fn direction_helpers() {
        assert!(Direction::Peak.reached(72.0, 72.0));
        assert!(!Direction::Trough.reached(28.5, 28.0));
        assert!(Direction::Trough.beyond(20.0, 25.0));
        assert_eq!(Direction::Peak.retrace(84.0, 3.0), 81.0);
        assert_eq!(Direction::Trough.retrace(20.0, 3.0), 23.0);
        assert!(Direction::Peak.retraced(81.0, 84.0, 3.0));
        assert!(!Direction::Trough.retraced(22.0, 20.0, 3.0));
    }
}
