//! Token-bounded message splitting.
//!
//! Message text is embedded downstream by consumers with a hard context
//! limit, so anything longer than `limit` tokens is cut into consecutive
//! fixed-size token windows and decoded back to text. No overlap between
//! windows; decoding all windows in order reproduces the input.

use tiktoken_rs::CoreBPE;

use crate::{Error, Result};

pub struct TokenChunker {
    bpe: CoreBPE,
    limit: usize,
}

impl TokenChunker {
    /// Build a chunker over the r50k (GPT-2 family) encoding.
    pub fn new(limit: usize) -> Result<Self> {
        let bpe = tiktoken_rs::r50k_base().map_err(|e| Error::Chunk(e.to_string()))?;
        Ok(Self { bpe, limit })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Split `text` into token-bounded segments.
    ///
    /// Within the limit the text is returned unchanged as a single segment.
    /// A window that lands mid-codepoint fails to decode; the caller skips
    /// that message rather than emitting mangled text.
    pub fn chunk(&self, text: &str) -> Result<Vec<String>> {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= self.limit {
            return Ok(vec![text.to_string()]);
        }

        tokens
            .chunks(self.limit)
            .map(|window| {
                self.bpe
                    .decode(window.to_vec())
                    .map_err(|e| Error::Chunk(e.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_unchanged_segment() {
        let chunker = TokenChunker::new(4096).unwrap();
        let text = "hello world, nothing to split here";
        let chunks = chunker.chunk(text).unwrap();
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn long_text_splits_into_ceil_token_windows() {
        let chunker = TokenChunker::new(64).unwrap();
        let text = "the quick brown fox jumps over the lazy dog ".repeat(40);
        let token_count = chunker.bpe.encode_ordinary(&text).len();
        assert!(token_count > 64);

        let chunks = chunker.chunk(&text).unwrap();
        assert_eq!(chunks.len(), token_count.div_ceil(64));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn ten_thousand_tokens_at_4096_yield_three_chunks() {
        let chunker = TokenChunker::new(4096).unwrap();
        // Each repetition of this phrase encodes to a handful of tokens;
        // scale until the total lands between 2*4096 and 3*4096.
        let phrase = "token budget filler text for chunk windows ".repeat(50);
        let mut text = String::new();
        loop {
            text.push_str(&phrase);
            let n = chunker.bpe.encode_ordinary(&text).len();
            if n > 10_000 {
                assert!(n <= 3 * 4096, "test text overshot three windows");
                break;
            }
        }

        let chunks = chunker.chunk(&text).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), text);
    }
}
