//! Token-window chunking with fixed overlap.
//!
//! A token is a maximal run of non-whitespace characters. Windows of at most
//! `max_chunk_tokens` tokens advance by `max_chunk_tokens - overlap_tokens`,
//! so consecutive segments share exactly `overlap_tokens` tokens. Each
//! segment is the slice of the source text spanning its first to last token,
//! which keeps line breaks and spacing inside the window intact.

use crate::config::ChunkingSettings;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    max_tokens: usize,
    overlap: usize,
}

/// One chunker output: the segment text plus its position in the token stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    pub index: usize,
    pub text: &'a str,
    pub token_count: usize,
    /// Index of the first token of this segment in the whole document.
    pub first_token: usize,
}

impl Chunker {
    pub fn new(settings: ChunkingSettings) -> Result<Self> {
        if settings.max_chunk_tokens == 0 {
            return Err(Error::InvalidConfig("max_chunk_tokens must be positive".into()));
        }
        if settings.overlap_tokens >= settings.max_chunk_tokens {
            return Err(Error::InvalidConfig(format!(
                "overlap_tokens ({}) must be smaller than max_chunk_tokens ({})",
                settings.overlap_tokens, settings.max_chunk_tokens
            )));
        }
        Ok(Self { max_tokens: settings.max_chunk_tokens, overlap: settings.overlap_tokens })
    }

    pub fn max_tokens(&self) -> usize { self.max_tokens }
    pub fn overlap(&self) -> usize { self.overlap }

    /// Lazily splits `text`. The returned iterator is `Clone`, so the
    /// sequence can be restarted without re-tokenizing.
    pub fn chunks<'a>(&self, text: &'a str) -> Result<Chunks<'a>> {
        let spans = token_spans(text);
        if spans.is_empty() {
            return Err(Error::InvalidInput("cannot chunk empty text".into()));
        }
        Ok(Chunks { text, spans, max_tokens: self.max_tokens, step: self.max_tokens - self.overlap, next_start: Some(0), index: 0 })
    }
}

#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    spans: Vec<(usize, usize)>,
    max_tokens: usize,
    step: usize,
    next_start: Option<usize>,
    index: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start?;
        let end = (start + self.max_tokens).min(self.spans.len());
        let byte_start = self.spans[start].0;
        let byte_end = self.spans[end - 1].1;
        self.next_start = if end >= self.spans.len() { None } else { Some(start + self.step) };
        let segment = Segment { index: self.index, text: &self.text[byte_start..byte_end], token_count: end - start, first_token: start };
        self.index += 1;
        Some(segment)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.next_start {
            None => 0,
            Some(start) => {
                let left = self.spans.len() - start;
                if left <= self.max_tokens { 1 } else { 1 + (left - self.max_tokens).div_ceil(self.step) }
            }
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunks<'_> {}

/// Whitespace token count, the unit used for chunk budgets and stats.
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

fn token_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, ch) in text.char_indices() {
        match (ch.is_whitespace(), start) {
            (true, Some(s)) => { spans.push((s, i)); start = None; }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start { spans.push((s, text.len())); }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_cover_unicode_tokens() {
        let spans = token_spans("  progressão\tde\nregime ");
        assert_eq!(spans.len(), 3);
        let text = "  progressão\tde\nregime ";
        assert_eq!(&text[spans[0].0..spans[0].1], "progressão");
        assert_eq!(&text[spans[2].0..spans[2].1], "regime");
    }

    #[test]
    fn size_hint_matches_output() {
        let chunker = Chunker::new(ChunkingSettings { max_chunk_tokens: 4, overlap_tokens: 1 }).expect("chunker");
        let text = (0..23).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let chunks = chunker.chunks(&text).expect("chunks");
        let hinted = chunks.len();
        assert_eq!(hinted, chunks.count());
    }
}
