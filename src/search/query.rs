use crate::analysis::token::{self, ByteClass, MAX_TOKEN_BYTES};
use crate::analysis::tokenizer::{class_run_len, token_runs, windowed_token_mask, windowed_token_value};
use crate::core::error::{Error, ErrorKind, Result};

/// Trie pattern; a stored token matches when `token & mask == value`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPattern {
    pub value: u64,
    pub mask: u64,
}

impl TokenPattern {
    pub fn windowed(text: &[u8], offset: isize, allow_partial: bool) -> Self {
        TokenPattern {
            value: windowed_token_value(text, offset),
            mask: windowed_token_mask(text, offset, allow_partial),
        }
    }

    pub fn matches(&self, token: u64) -> bool {
        token & self.mask == self.value
    }
}

/// A substring query compiled into trie patterns.
///
/// Index tokens are cut at run boundaries of the indexed text, so a match may
/// begin anywhere inside an index token. The first run of the query therefore
/// yields one pattern per possible position inside that token (`leading`, any may
/// match). Every later run starts at a class boundary, which the indexed text
/// shares, so its tokens line up exactly (`following`, all must match). A pattern
/// whose bytes reach the end of the query accepts longer tokens.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    text: Vec<u8>,
    leading: Vec<TokenPattern>,
    following: Vec<TokenPattern>,
}

impl SearchQuery {
    pub fn new(query: impl AsRef<[u8]>) -> Result<Self> {
        let text: Vec<u8> = query.as_ref().iter().map(|&b| token::fold(b)).collect();
        if text.is_empty() {
            return Err(Error::new(ErrorKind::InvalidArgument, "empty search query"));
        }
        if text.contains(&b'\n') {
            return Err(Error::new(ErrorKind::InvalidArgument, "search query spans lines"));
        }

        let first_len = class_run_len(&text, 0);
        let first_run = &text[..first_len];
        let first_is_whole_query = first_len == text.len();

        // An "other" byte is always a token of its own, so it cannot sit mid-token
        let shifts = if ByteClass::of(text[0]).merges() { MAX_TOKEN_BYTES } else { 1 };
        let leading = (0..shifts)
            .map(|shift| TokenPattern::windowed(first_run, -(shift as isize), first_is_whole_query))
            .collect();

        let rest = &text[first_len..];
        let following = token_runs(rest)
            .map(|run| {
                let at_end = run.end == rest.len();
                TokenPattern::windowed(&rest[run], 0, at_end)
            })
            .collect();

        Ok(SearchQuery { text, leading, following })
    }

    /// Case-folded query bytes
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    pub fn leading(&self) -> &[TokenPattern] {
        &self.leading
    }

    pub fn following(&self) -> &[TokenPattern] {
        &self.following
    }

    /// Case-insensitive substring test against one line
    pub fn matches_line(&self, line: &[u8]) -> bool {
        line.windows(self.text.len()).any(|window| {
            window
                .iter()
                .zip(&self.text)
                .all(|(&a, &b)| token::fold(a) == b)
        })
    }
}
