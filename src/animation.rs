//! Easing curves and time-based interpolation shared by the section controller.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Deserialize;

/// Easing curves in the power family (power1 = quadratic, power2 = cubic, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ease {
    Linear,
    #[serde(rename = "power1-in")]
    Power1In,
    #[serde(rename = "power1-out")]
    Power1Out,
    #[serde(rename = "power1-in-out")]
    Power1InOut,
    #[serde(rename = "power2-in")]
    Power2In,
    #[serde(rename = "power2-out")]
    Power2Out,
    #[serde(rename = "power2-in-out")]
    Power2InOut,
    #[serde(rename = "power3-in")]
    Power3In,
    #[serde(rename = "power3-out")]
    Power3Out,
    #[serde(rename = "power3-in-out")]
    Power3InOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    In,
    Out,
    InOut,
}

impl Ease {
    fn parts(self) -> (i32, Shape) {
        match self {
            Self::Linear => (1, Shape::In),
            Self::Power1In => (2, Shape::In),
            Self::Power1Out => (2, Shape::Out),
            Self::Power1InOut => (2, Shape::InOut),
            Self::Power2In => (3, Shape::In),
            Self::Power2Out => (3, Shape::Out),
            Self::Power2InOut => (3, Shape::InOut),
            Self::Power3In => (4, Shape::In),
            Self::Power3Out => (4, Shape::Out),
            Self::Power3InOut => (4, Shape::InOut),
        }
    }

    /// Maps linear progress in `[0, 1]` onto the eased curve. Input is clamped.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        let (power, shape) = self.parts();
        match shape {
            Shape::In => t.powi(power),
            Shape::Out => 1.0 - (1.0 - t).powi(power),
            Shape::InOut => {
                if t < 0.5 {
                    (2.0 * t).powi(power) / 2.0
                } else {
                    1.0 - (2.0 - 2.0 * t).powi(power) / 2.0
                }
            }
        }
    }
}

impl fmt::Display for Ease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (power, shape) = self.parts();
        if power == 1 {
            return f.write_str("linear");
        }
        let shape = match shape {
            Shape::In => "in",
            Shape::Out => "out",
            Shape::InOut => "in-out",
        };
        write!(f, "power{}-{}", power - 1, shape)
    }
}

/// Fixed-duration clock window with an easing curve.
#[derive(Debug, Clone, Copy)]
pub struct Tween {
    started_at: Instant,
    duration: Duration,
    ease: Ease,
}

impl Tween {
    pub fn new(started_at: Instant, duration: Duration, ease: Ease) -> Self {
        Self {
            started_at,
            duration,
            ease,
        }
    }

    pub fn ends_at(&self) -> Instant {
        self.started_at + self.duration
    }

    pub fn is_complete(&self, now: Instant) -> bool {
        now >= self.ends_at()
    }

    /// Linear progress in `[0, 1]`.
    pub fn linear_progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    /// Eased progress in `[0, 1]`.
    pub fn progress(&self, now: Instant) -> f32 {
        self.ease.apply(self.linear_progress(now))
    }
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curves_hit_endpoints() {
        for ease in [
            Ease::Linear,
            Ease::Power1In,
            Ease::Power1Out,
            Ease::Power1InOut,
            Ease::Power2InOut,
            Ease::Power3Out,
            Ease::Power3InOut,
        ] {
            assert!(ease.apply(0.0).abs() < 1e-6, "{ease} at 0");
            assert!((ease.apply(1.0) - 1.0).abs() < 1e-6, "{ease} at 1");
        }
    }

    #[test]
    fn in_out_is_symmetric_around_midpoint() {
        let ease = Ease::Power1InOut;
        assert!((ease.apply(0.5) - 0.5).abs() < 1e-6);
        assert!((ease.apply(0.25) + ease.apply(0.75) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn power3_out_front_loads_motion() {
        assert!(Ease::Power3Out.apply(0.2) > 0.5);
        assert!((Ease::Power3Out.apply(0.5) - 0.9375).abs() < 1e-6);
    }

    #[test]
    fn tween_progress_clamps_outside_window() {
        let start = Instant::now();
        let tween = Tween::new(start, Duration::from_millis(100), Ease::Linear);
        assert_eq!(tween.linear_progress(start), 0.0);
        assert!((tween.linear_progress(start + Duration::from_millis(50)) - 0.5).abs() < 1e-3);
        assert_eq!(tween.linear_progress(start + Duration::from_secs(5)), 1.0);
        assert!(!tween.is_complete(start + Duration::from_millis(99)));
        assert!(tween.is_complete(start + Duration::from_millis(100)));
    }

    #[test]
    fn displays_config_names() {
        assert_eq!(Ease::Power1InOut.to_string(), "power1-in-out");
        assert_eq!(Ease::Power3Out.to_string(), "power3-out");
        assert_eq!(Ease::Linear.to_string(), "linear");
    }
}
