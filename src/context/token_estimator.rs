//! Token estimation

use crate::config::TokenizerKind;
use std::sync::Arc;
use tiktoken_rs::{cl100k_base, CoreBPE};
use tracing::warn;

/// Token estimator trait for different tokenization strategies
pub trait TokenEstimator: Send + Sync {
    /// Estimate the number of tokens in the given text
    fn estimate(&self, text: &str) -> usize;

    /// Estimate tokens for multiple texts
    fn estimate_batch(&self, texts: &[&str]) -> Vec<usize> {
        texts.iter().map(|t| self.estimate(t)).collect()
    }
}

/// Fixed characters-per-token approximation
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    tokens_per_char: f64,
}

impl CharRatioEstimator {
    pub fn new(tokens_per_char: f64) -> Self {
        Self { tokens_per_char }
    }
}

impl Default for CharRatioEstimator {
    /// Four characters per token
    fn default() -> Self {
        Self::new(0.25)
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        (text.chars().count() as f64 * self.tokens_per_char).ceil() as usize
    }
}

/// Tiktoken-based token estimator using cl100k_base
pub struct TiktokenEstimator {
    bpe: Arc<CoreBPE>,
}

impl TiktokenEstimator {
    pub fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let bpe = cl100k_base().map_err(|e| e.to_string())?;
        Ok(Self { bpe: Arc::new(bpe) })
    }
}

impl TokenEstimator for TiktokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Build the configured estimator, falling back to the character ratio
pub fn estimator_for(kind: TokenizerKind) -> Arc<dyn TokenEstimator> {
    match kind {
        TokenizerKind::CharRatio => Arc::new(CharRatioEstimator::default()),
        TokenizerKind::Cl100k => TiktokenEstimator::new()
            .map(|e| Arc::new(e) as Arc<dyn TokenEstimator>)
            .unwrap_or_else(|e| {
                warn!("cl100k tokenizer unavailable ({}), using character ratio", e);
                Arc::new(CharRatioEstimator::default())
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_ratio_rounds_up() {
        let estimator = CharRatioEstimator::default();
        assert_eq!(estimator.estimate(""), 0);
        assert_eq!(estimator.estimate("abc"), 1);
        assert_eq!(estimator.estimate("abcd"), 1);
        assert_eq!(estimator.estimate("abcde"), 2);
    }

    #[test]
    fn test_char_ratio_counts_chars_not_bytes() {
        let estimator = CharRatioEstimator::default();
        assert_eq!(estimator.estimate("ééééé"), 2);
    }

    #[test]
    fn test_tiktoken_estimator() {
        let Ok(estimator) = TiktokenEstimator::new() else {
            eprintln!("cl100k encoding unavailable, skipping");
            return;
        };
        let tokens = estimator.estimate("Hello, world! This is a test.");
        assert!(tokens > 0);
        assert!(tokens < 20);
    }

    #[test]
    fn test_cl100k_kind_always_yields_an_estimator() {
        let estimator = estimator_for(TokenizerKind::Cl100k);
        assert!(estimator.estimate("fn main() {}") > 0);
    }

    #[test]
    fn test_batch_estimation() {
        let estimator = estimator_for(TokenizerKind::CharRatio);
        let tokens = estimator.estimate_batch(&["Hello", "world", "test"]);
        assert_eq!(tokens, vec![2, 2, 1]);
    }
}
