//! Synthetic request generation
//!
//! Every prompt in a dummy batch is the sentinel token repeated
//! `input_length` times, so latency depends only on batch size, lengths and
//! the engine, never on prompt content.

use crate::engine::TokenId;
use crate::error::{invalid_config, BenchResult};

/// Token id every dummy prompt is built from
pub const SENTINEL_TOKEN: TokenId = 0;

/// `batch_size` identical prompts of `input_length` sentinel tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DummyBatch {
    prompts: Vec<Vec<TokenId>>,
    input_length: usize,
}

impl DummyBatch {
    pub fn prompts(&self) -> &[Vec<TokenId>] {
        &self.prompts
    }

    pub fn batch_size(&self) -> usize {
        self.prompts.len()
    }

    pub fn input_length(&self) -> usize {
        self.input_length
    }

    /// Prompt tokens across the whole batch
    pub fn total_tokens(&self) -> usize {
        self.batch_size() * self.input_length
    }
}

/// Build the dummy batch for one configuration
pub fn dummy_batch(batch_size: usize, input_length: usize) -> BenchResult<DummyBatch> {
    if batch_size == 0 {
        return Err(invalid_config("batch size must be positive"));
    }
    if input_length == 0 {
        return Err(invalid_config("input length must be positive"));
    }
    Ok(DummyBatch {
        prompts: vec![vec![SENTINEL_TOKEN; input_length]; batch_size],
        input_length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BenchError;
    use proptest::prelude::*;

    #[test]
    fn test_dummy_batch_shape() {
        let batch = dummy_batch(8, 32).unwrap();
        assert_eq!(batch.batch_size(), 8);
        assert_eq!(batch.input_length(), 32);
        assert_eq!(batch.total_tokens(), 256);
        assert!(batch.prompts().iter().all(|p| p == &vec![0; 32]));
    }

    #[test]
    fn test_zero_arguments_rejected() {
        assert!(matches!(
            dummy_batch(0, 32),
            Err(BenchError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            dummy_batch(4, 0),
            Err(BenchError::InvalidConfiguration(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_every_prompt_is_sentinel_of_exact_length(
            batch_size in 1usize..64,
            input_length in 1usize..512,
        ) {
            let batch = dummy_batch(batch_size, input_length).unwrap();
            prop_assert_eq!(batch.prompts().len(), batch_size);
            for prompt in batch.prompts() {
                prop_assert_eq!(prompt.len(), input_length);
                prop_assert!(prompt.iter().all(|&t| t == SENTINEL_TOKEN));
            }
        }
    }
}
