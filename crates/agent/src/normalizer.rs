use std::sync::Arc;

use ednna_core::lexicon::Lexicon;
use ednna_core::text::normalize_input;

/// Maps known misspellings and variants to their canonical term. Output is
/// for matching only; logs and replies always use the raw utterance.
#[derive(Clone, Debug)]
pub struct TermNormalizer {
    lexicon: Arc<Lexicon>,
}

impl TermNormalizer {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }

    pub fn normalize(&self, text: &str) -> String {
        self.lexicon.terms.replace_all(&normalize_input(text))
    }
}
