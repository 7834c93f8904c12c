//! Coordinator configuration
//!
//! Loaded from JSON with every field optional; missing fields take the
//! defaults below.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid parameter: {name} - {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Unknown path aggregation policy: {0}")]
    UnknownAggregation(String),
}

/// Policy selecting which discovered paths a domain advertises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathAggregation {
    /// Advertise every discovered path
    #[default]
    FullExpansion,
    /// Highest-rate twin per endpoint pair
    OnePath,
    /// Best-combined pair of twins per endpoint pair
    TwoPaths,
}

impl PathAggregation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FullExpansion => "full_expansion",
            Self::OnePath => "one_path",
            Self::TwoPaths => "two_paths",
        }
    }
}

impl fmt::Display for PathAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PathAggregation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full_expansion" => Ok(Self::FullExpansion),
            "one_path" => Ok(Self::OnePath),
            "two_paths" => Ok(Self::TwoPaths),
            other => Err(ConfigError::UnknownAggregation(other.to_owned())),
        }
    }
}

/// Parameters of one hierarchy run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub path_aggregation: PathAggregation,
    /// Upper bound on the flow one path computation may push
    pub flow_cutoff: Option<f64>,
    /// Solved quantities at or above this count as non-zero
    pub tolerance: f64,
    /// Capacities at or below this count as exhausted
    pub capacity_epsilon: f64,
    /// Safety bound on fold/augment rounds per path computation
    pub max_fold_rounds: usize,
    pub validation_tolerance: f64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            path_aggregation: PathAggregation::FullExpansion,
            flow_cutoff: None,
            tolerance: 1e-5,
            capacity_epsilon: 1e-9,
            max_fold_rounds: 256,
            validation_tolerance: 1e-4,
        }
    }
}

impl CoordinatorConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_aggregation(mut self, policy: PathAggregation) -> Self {
        self.path_aggregation = policy;
        self
    }

    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.flow_cutoff = Some(cutoff);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("tolerance", self.tolerance),
            ("capacity_epsilon", self.capacity_epsilon),
            ("validation_tolerance", self.validation_tolerance),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ConfigError::InvalidParameter {
                    name,
                    reason: format!("must be a positive finite number, got {value}"),
                });
            }
        }
        if let Some(cutoff) = self.flow_cutoff {
            if cutoff.is_nan() || cutoff < 0.0 {
                return Err(ConfigError::InvalidParameter {
                    name: "flow_cutoff",
                    reason: format!("must be non-negative, got {cutoff}"),
                });
            }
        }
        if self.max_fold_rounds == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "max_fold_rounds",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}
