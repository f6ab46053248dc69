//! Load balancing algorithm selection.

use std::fmt;

/// The configured selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    RoundRobin,
    Random,
    WeightedRoundRobin,
    WeightedRandom,
}

impl Algorithm {
    /// Parse the configured algorithm name. Unknown values warn and fall
    /// back to weighted round-robin.
    pub fn parse_or_default(name: &str) -> Self {
        match name {
            "ROUND_ROBIN" => Algorithm::RoundRobin,
            "RANDOM" => Algorithm::Random,
            "WEIGHTED_ROUND_ROBIN" => Algorithm::WeightedRoundRobin,
            "WEIGHTED_RANDOM" => Algorithm::WeightedRandom,
            other => {
                tracing::warn!(
                    algorithm = %other,
                    "Unknown load balancing algorithm, defaulting to WEIGHTED_ROUND_ROBIN"
                );
                Algorithm::WeightedRoundRobin
            }
        }
    }

    /// Whether this policy consumes the weighted sequence.
    pub fn is_weighted(&self) -> bool {
        matches!(
            self,
            Algorithm::WeightedRoundRobin | Algorithm::WeightedRandom
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "ROUND_ROBIN",
            Algorithm::Random => "RANDOM",
            Algorithm::WeightedRoundRobin => "WEIGHTED_ROUND_ROBIN",
            Algorithm::WeightedRandom => "WEIGHTED_RANDOM",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
