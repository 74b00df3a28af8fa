//! Ratchet invariant for the long trailing stop.
//!
//! **Core Rule:** the stop may rise, never fall, for the life of a position.
//! A falling close produces a lower candidate stop, which is ignored.

use serde::{Deserialize, Serialize};

/// Trailing stop level for an open long position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatchetStop {
    level: f64,
}

impl RatchetStop {
    pub fn new(initial_level: f64) -> Self {
        Self {
            level: initial_level,
        }
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    /// Move the stop to `candidate` if that tightens it.
    ///
    /// Returns true when the level changed. Equal or lower candidates (and
    /// NaN) leave the stop untouched.
    ///
    /// # Example
    /// ```
    /// use hatrader_core::position::RatchetStop;
    ///
    /// let mut stop = RatchetStop::new(97.0);
    /// assert!(stop.tighten(99.102));
    /// assert!(!stop.tighten(89.64));
    /// assert_eq!(stop.level(), 99.102);
    /// ```
    pub fn tighten(&mut self, candidate: f64) -> bool {
        if candidate > self.level {
            self.level = candidate;
            true
        } else {
            false
        }
    }

    /// Whether a close has reached the stop.
    pub fn is_hit(&self, close: f64) -> bool {
        close <= self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tightening_allowed() {
        let mut stop = RatchetStop::new(95.0);
        assert!(stop.tighten(100.0));
        assert_eq!(stop.level(), 100.0);
    }

    #[test]
    fn loosening_blocked() {
        let mut stop = RatchetStop::new(100.0);
        assert!(!stop.tighten(90.0));
        assert_eq!(stop.level(), 100.0);
    }

    #[test]
    fn equal_candidate_is_not_a_change() {
        let mut stop = RatchetStop::new(100.0);
        assert!(!stop.tighten(100.0));
    }

    #[test]
    fn nan_candidate_ignored() {
        let mut stop = RatchetStop::new(100.0);
        assert!(!stop.tighten(f64::NAN));
        assert_eq!(stop.level(), 100.0);
    }

    #[test]
    fn hit_is_inclusive() {
        let stop = RatchetStop::new(99.0);
        assert!(stop.is_hit(99.0));
        assert!(stop.is_hit(90.0));
        assert!(!stop.is_hit(99.01));
    }
}
