//! Corpus assembly and token budgeting.
//!
//! Scraped page texts are joined in discovery order, curly braces are escaped
//! so the downstream templating layer does not read them as placeholders, and
//! the result is trimmed from the tail until it fits the token ceiling.

use crate::models::ScrapedDocument;
use thiserror::Error;
use tiktoken_rs::CoreBPE;
use tracing::{debug, info, instrument};

/// Separator placed between consecutive documents in the corpus.
pub const DOCUMENT_SEPARATOR: &str = "\n\n";

/// Errors raised while preparing the corpus.
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("No tokenizer available for model {model}: {reason}")]
    Tokenizer { model: String, reason: String },
}

/// Measures text length in model tokens.
pub trait TokenCounter {
    fn count_tokens(&self, text: &str) -> usize;
}

/// BPE tokenizer of an OpenAI model family.
pub struct Tiktoken {
    model: String,
    bpe: CoreBPE,
}

impl Tiktoken {
    pub fn for_model(model: &str) -> Result<Self, ContextError> {
        let bpe = tiktoken_rs::get_bpe_from_model(model).map_err(|e| ContextError::Tokenizer {
            model: model.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            model: model.to_string(),
            bpe,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for Tiktoken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tiktoken").field("model", &self.model).finish()
    }
}

impl TokenCounter for Tiktoken {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Join non-empty document texts with a blank line, in the given order.
///
/// Empty documents (failed scrapes) contribute nothing, not even a separator.
pub fn assemble_corpus(documents: &[ScrapedDocument]) -> String {
    let mut corpus = String::new();
    for doc in documents.iter().filter(|d| !d.is_empty()) {
        if !corpus.is_empty() {
            corpus.push_str(DOCUMENT_SEPARATOR);
        }
        corpus.push_str(&doc.text);
    }
    corpus
}

/// Double every curly brace that is not already part of a brace pair.
///
/// A `{` is doubled when neither neighbour is `{`; `}` likewise with `}`.
/// Runs of two or more identical braces are left untouched.
pub fn escape_braces(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    for (i, &c) in chars.iter().enumerate() {
        out.push(c);
        if c == '{' || c == '}' {
            let before = i.checked_sub(1).map(|j| chars[j]);
            let after = chars.get(i + 1).copied();
            if before != Some(c) && after != Some(c) {
                out.push(c);
            }
        }
    }
    out
}

/// Shrink `corpus` from the tail until `counter` measures it at or under `ceiling`.
///
/// Each round keeps the first 90% of the current characters. A corpus already
/// within budget is returned unchanged.
#[instrument(level = "info", skip_all, fields(ceiling = ceiling))]
pub fn trim_to_budget<T: TokenCounter + ?Sized>(corpus: &str, ceiling: usize, counter: &T) -> String {
    let mut tokens = counter.count_tokens(corpus);
    if tokens <= ceiling {
        debug!(tokens, "Corpus within budget");
        return corpus.to_string();
    }

    let initial_tokens = tokens;
    let mut kept = corpus.chars().count();
    let mut text = corpus;
    let mut rounds = 0usize;

    while tokens > ceiling && kept > 0 {
        kept = (kept as f64 * 0.9) as usize;
        text = char_prefix(text, kept);
        tokens = counter.count_tokens(text);
        rounds += 1;
        debug!(rounds, kept_chars = kept, tokens, "Trimmed corpus");
    }

    info!(
        initial_tokens,
        final_tokens = tokens,
        rounds,
        kept_chars = kept,
        "Trimmed corpus to token budget"
    );
    text.to_string()
}

/// Longest prefix of `text` holding at most `chars` characters.
fn char_prefix(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Assemble, escape and budget the corpus in one step.
pub fn build_context<T: TokenCounter + ?Sized>(
    documents: &[ScrapedDocument],
    ceiling: usize,
    counter: &T,
) -> String {
    let corpus = assemble_corpus(documents);
    let escaped = escape_braces(&corpus);
    trim_to_budget(escaped.trim(), ceiling, counter)
}
