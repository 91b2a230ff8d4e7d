//! Playback pacing policy

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How recorded inter-frame delays are reproduced for viewers
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    /// Pass the recorded delay through unchanged
    #[default]
    Recorded,

    /// Never wait longer than this many seconds between frames
    Capped(f64),

    /// Multiply every delay by this factor (expected in `(0, 1]`)
    Scaled(f64),
}

impl Pacing {
    /// Normalize the policy, falling back to `Recorded` for unusable factors
    ///
    /// Scale factors above one never slow playback down: they clamp to one.
    pub fn normalize(self) -> Self {
        match self {
            Pacing::Capped(max) if !(max.is_finite() && max >= 0.0) => Pacing::Recorded,
            Pacing::Scaled(k) if !(k.is_finite() && k > 0.0) => Pacing::Recorded,
            Pacing::Scaled(k) => Pacing::Scaled(k.min(1.0)),
            other => other,
        }
    }

    /// Whether the policy alters recorded delays at all
    pub fn compresses(self) -> bool {
        match self.normalize() {
            Pacing::Recorded => false,
            Pacing::Scaled(k) => k < 1.0,
            Pacing::Capped(_) => true,
        }
    }

    /// Wait time for a recorded delay in seconds
    pub fn apply(self, delay: f64) -> Duration {
        let delay = if delay.is_finite() { delay.max(0.0) } else { 0.0 };
        let paced = match self.normalize() {
            Pacing::Recorded => delay,
            Pacing::Capped(max) => delay.min(max),
            Pacing::Scaled(k) => delay * k,
        };
        Duration::try_from_secs_f64(paced).unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_passes_through() {
        assert_eq!(Pacing::Recorded.apply(2.5), Duration::from_millis(2500));
        assert_eq!(Pacing::Recorded.apply(-1.0), Duration::ZERO);
        assert!(!Pacing::Recorded.compresses());
    }

    #[test]
    fn capped_and_scaled() {
        assert_eq!(Pacing::Capped(1.0).apply(12.0), Duration::from_secs(1));
        assert_eq!(Pacing::Capped(1.0).apply(0.25), Duration::from_millis(250));
        assert_eq!(Pacing::Scaled(0.5).apply(3.0), Duration::from_millis(1500));
        assert!(Pacing::Capped(1.0).compresses());
    }

    #[test]
    fn invalid_factors_fall_back() {
        assert_eq!(Pacing::Scaled(0.0).normalize(), Pacing::Recorded);
        assert_eq!(Pacing::Scaled(f64::NAN).normalize(), Pacing::Recorded);
        assert_eq!(Pacing::Capped(-3.0).normalize(), Pacing::Recorded);
        assert_eq!(Pacing::Scaled(-2.0).apply(4.0), Duration::from_secs(4));
    }

    #[test]
    fn yaml_representation() {
        fn parse(yaml: &str) -> Pacing {
            serde_yaml_ng::with::singleton_map::deserialize(serde_yaml_ng::Deserializer::from_str(yaml))
                .expect(yaml)
        }
        assert_eq!(parse("capped: 1.5"), Pacing::Capped(1.5));
        assert_eq!(parse("scaled: 0.25"), Pacing::Scaled(0.25));
        assert_eq!(parse("recorded"), Pacing::Recorded);
    }

    #[test]
    fn oversized_scale_never_overflows() {
        assert_eq!(Pacing::Scaled(1e300).normalize(), Pacing::Scaled(1.0));
        assert_eq!(Pacing::Scaled(1e300).apply(5.0), Duration::from_secs(5));
        assert_eq!(Pacing::Recorded.apply(f64::MAX), Duration::MAX);
    }
}
