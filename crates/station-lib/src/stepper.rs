//! Half-open float stepping used to place stations along a measure range

use crate::{ConfigError, Result};

/// Lazy sequence of measures from `start` towards `stop`, excluding `stop`
///
/// Values are accumulated by repeated addition so that the number of stations
/// matches what an incremental walk along the route produces. The sequence is
/// `Clone`, so it can be restarted from its current position.
#[derive(Clone, Debug, PartialEq)]
pub struct StepRange {
    current: f64,
    stop: f64,
    step: f64,
}

/// Step from `start` to `stop` (exclusive) by `step`
///
/// A positive step counts up while the value stays strictly below `stop`, a
/// negative step counts down while it stays strictly above. `stop` itself is
/// never produced, even when it is an exact multiple of `step` from `start`.
///
/// # Errors
/// [`ConfigError::InvalidStep`] when `step` is zero or not finite.
pub fn step_range(start: f64, stop: f64, step: f64) -> Result<StepRange> {
    if step == 0.0 || !step.is_finite() {
        return Err(ConfigError::InvalidStep(step).into());
    }
    Ok(StepRange {
        current: start,
        stop,
        step,
    })
}

impl Iterator for StepRange {
    type Item = f64;

    #[inline]
    fn next(&mut self) -> Option<f64> {
        let value = self.current;
        let in_range = if self.step > 0.0 {
            value < self.stop
        } else {
            value > self.stop
        };
        if !in_range {
            return None;
        }
        self.current += self.step;
        Some(value)
    }
}

impl std::iter::FusedIterator for StepRange {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn collect(start: f64, stop: f64, step: f64) -> Vec<f64> {
        step_range(start, stop, step).unwrap().collect()
    }

    #[test]
    fn test_excludes_stop() {
        assert_eq!(collect(0.0, 10.0, 3.0), vec![0.0, 3.0, 6.0, 9.0]);
    }

    #[test]
    fn test_exact_multiple_endpoint_is_excluded() {
        assert_eq!(collect(0.0, 9.0, 3.0), vec![0.0, 3.0, 6.0]);
        assert_eq!(collect(0.0, 100.0, 25.0), vec![0.0, 25.0, 50.0, 75.0]);
    }

    #[test]
    fn test_empty_when_start_not_below_stop() {
        assert!(collect(5.0, 5.0, 1.0).is_empty());
        assert!(collect(6.0, 5.0, 1.0).is_empty());
    }

    #[test]
    fn test_negative_step_counts_down() {
        assert_eq!(collect(10.0, 0.0, -4.0), vec![10.0, 6.0, 2.0]);
        assert!(collect(0.0, 10.0, -1.0).is_empty());
    }

    #[test]
    fn test_zero_step_is_rejected() {
        assert!(matches!(
            step_range(0.0, 1.0, 0.0),
            Err(Error::Config(ConfigError::InvalidStep(_)))
        ));
        assert!(step_range(0.0, 1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_fractional_step_uses_accumulation() {
        let values = collect(0.0, 1.0, 0.1);
        let mut expected = Vec::new();
        let mut acc = 0.0;
        while acc < 1.0 {
            expected.push(acc);
            acc += 0.1;
        }
        assert_eq!(values, expected);
        // 0.1 accumulated ten times lands just below 1.0
        assert_eq!(values.len(), 11);
    }

    #[test]
    fn test_restartable_clone() {
        let mut range = step_range(0.0, 4.0, 1.0).unwrap();
        range.next();
        let snapshot = range.clone();
        assert_eq!(range.collect::<Vec<_>>(), snapshot.collect::<Vec<_>>());
    }
}
