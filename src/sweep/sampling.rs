//! Sampling parameters for one configuration

use std::fmt;

use serde::Serialize;

/// Sampling parameters sent with every generate call of a configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingSpec {
    /// Sequences generated per prompt
    pub n: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub use_beam_search: bool,
    /// Always set: every run must produce exactly `max_tokens` tokens
    pub ignore_eos: bool,
    pub max_tokens: usize,
}

impl SamplingSpec {
    /// Derive the sampling parameters for an output length.
    ///
    /// Beam search is deterministic, so it runs at temperature 0; random
    /// sampling runs at temperature 1.
    pub fn for_output_len(output_len: usize, n: usize, use_beam_search: bool) -> Self {
        SamplingSpec {
            n,
            temperature: if use_beam_search { 0.0 } else { 1.0 },
            top_p: 1.0,
            use_beam_search,
            ignore_eos: true,
            max_tokens: output_len,
        }
    }
}

impl fmt::Display for SamplingSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SamplingSpec(n={}, temperature={}, top_p={}, use_beam_search={}, ignore_eos={}, max_tokens={})",
            self.n, self.temperature, self.top_p, self.use_beam_search, self.ignore_eos, self.max_tokens
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_sampling_spec() {
        let spec = SamplingSpec::for_output_len(128, 1, false);
        assert_eq!(spec.temperature, 1.0);
        assert_eq!(spec.top_p, 1.0);
        assert_eq!(spec.max_tokens, 128);
        assert!(spec.ignore_eos);
        assert!(!spec.use_beam_search);
    }

    #[test]
    fn test_beam_search_forces_zero_temperature() {
        let spec = SamplingSpec::for_output_len(64, 4, true);
        assert_eq!(spec.temperature, 0.0);
        assert_eq!(spec.n, 4);
        assert!(spec.use_beam_search);
    }

    #[test]
    fn test_display() {
        let spec = SamplingSpec::for_output_len(16, 1, false);
        assert_eq!(
            spec.to_string(),
            "SamplingSpec(n=1, temperature=1, top_p=1, use_beam_search=false, ignore_eos=true, max_tokens=16)"
        );
    }
}
