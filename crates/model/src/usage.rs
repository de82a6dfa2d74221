use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

/// Token usage counters of one or more model calls.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct Usage {
    /// Number of requests made.
    pub requests: u64,
    /// Tokens sent to the model.
    pub input_tokens: u64,
    /// Tokens generated by the model.
    pub output_tokens: u64,
    /// Total tokens.
    pub total_tokens: u64,
}

impl Usage {
    /// Adds another usage record into this one.
    #[inline]
    pub fn add(&mut self, other: &Usage) {
        self.requests += other.requests;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

impl AddAssign for Usage {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.add(&rhs);
    }
}
