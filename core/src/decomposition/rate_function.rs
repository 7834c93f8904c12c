//! Closed set of VNF rate-transfer functions
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use serde::{Deserialize, Serialize};

/// Maps a VNF's incoming rate to its outgoing rate (or cpu demand)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateFunction {
    #[default]
    Identity,
    Linear {
        factor: f64,
    },
    /// `slope * x + intercept`, clamped to `[0, max]`
    Affine {
        slope: f64,
        intercept: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
}

impl RateFunction {
    pub fn apply(&self, rate: f64) -> f64 {
        match *self {
            Self::Identity => rate,
            Self::Linear { factor } => factor * rate,
            Self::Affine {
                slope,
                intercept,
                max,
            } => {
                let value = (slope * rate + intercept).max(0.0);
                max.map_or(value, |m| value.min(m))
            }
        }
    }

    /// Incoming rate producing `rate`, if the function is invertible there
    pub fn invert(&self, rate: f64) -> Option<f64> {
        match *self {
            Self::Identity => Some(rate),
            Self::Linear { factor } if factor != 0.0 => Some(rate / factor),
            Self::Affine {
                slope, intercept, ..
            } if slope != 0.0 => Some(((rate - intercept) / slope).max(0.0)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_apply_and_invert() {
        let linear = RateFunction::Linear { factor: 0.5 };
        assert_abs_diff_eq!(linear.apply(4.0), 2.0);
        assert_abs_diff_eq!(linear.invert(2.0).unwrap(), 4.0);

        let affine = RateFunction::Affine {
            slope: 2.0,
            intercept: 1.0,
            max: Some(10.0),
        };
        assert_abs_diff_eq!(affine.apply(3.0), 7.0);
        assert_abs_diff_eq!(affine.apply(30.0), 10.0);
        assert_abs_diff_eq!(affine.invert(7.0).unwrap(), 3.0);

        assert_eq!(RateFunction::Linear { factor: 0.0 }.invert(1.0), None);
        assert_abs_diff_eq!(RateFunction::Identity.apply(3.5), 3.5);
    }

    #[test]
    fn test_tagged_json() {
        let parsed: RateFunction =
            serde_json::from_str(r#"{"kind": "affine", "slope": 1.0, "intercept": 0.5}"#).unwrap();
        assert_eq!(
            parsed,
            RateFunction::Affine {
                slope: 1.0,
                intercept: 0.5,
                max: None
            }
        );
        let identity: RateFunction = serde_json::from_str(r#"{"kind": "identity"}"#).unwrap();
        assert_eq!(identity, RateFunction::default());
    }
}
