//! Motion requests handed to the planner by the command layer.

/// Feed rate of a requested move.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Feed {
    /// As fast as every axis limit allows.
    Rapid,
    /// Path speed in mm/min.
    UnitsPerMinute(f32),
    /// Complete the move in `1 / value` minutes.
    InverseTime(f32),
}

impl Feed {
    /// Requested path speed in mm/s for a move of `millimeters`.
    ///
    /// Returns `None` when the feed value is not a finite positive number.
    pub fn speed(self, millimeters: f32) -> Option<f32> {
        match self {
            Feed::Rapid => Some(f32::INFINITY),
            Feed::UnitsPerMinute(rate) if rate.is_finite() && rate > 0.0 => Some(rate / 60.0),
            Feed::InverseTime(rate) if rate.is_finite() && rate > 0.0 => {
                Some(millimeters * rate / 60.0)
            }
            _ => None,
        }
    }

    /// Raw feed value, for error reports.
    pub fn value(self) -> f32 {
        match self {
            Feed::Rapid => f32::INFINITY,
            Feed::UnitsPerMinute(rate) | Feed::InverseTime(rate) => rate,
        }
    }
}

/// A linear move to an absolute machine position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionRequest<const AXES: usize> {
    /// Target position in millimeters.
    pub target: [f32; AXES],
    /// Requested feed.
    pub feed: Feed,
}

impl<const AXES: usize> MotionRequest<AXES> {
    /// Move to `target` at `mm_per_min`.
    pub fn new(target: [f32; AXES], mm_per_min: f32) -> Self {
        Self {
            target,
            feed: Feed::UnitsPerMinute(mm_per_min),
        }
    }

    /// Rapid move to `target`.
    pub fn rapid(target: [f32; AXES]) -> Self {
        Self {
            target,
            feed: Feed::Rapid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_speed() {
        assert_eq!(Feed::UnitsPerMinute(600.0).speed(3.0), Some(10.0));
        // 2 moves per minute over 30 mm -> 60 mm/min
        assert_eq!(Feed::InverseTime(2.0).speed(30.0), Some(1.0));
        assert_eq!(Feed::Rapid.speed(1.0), Some(f32::INFINITY));
    }

    #[test]
    fn test_invalid_feed() {
        assert_eq!(Feed::UnitsPerMinute(0.0).speed(1.0), None);
        assert_eq!(Feed::UnitsPerMinute(-5.0).speed(1.0), None);
        assert_eq!(Feed::InverseTime(f32::NAN).speed(1.0), None);
    }
}
