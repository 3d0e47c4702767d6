use std::collections::HashSet;
use std::sync::Arc;

use ednna_core::lexicon::Lexicon;
use ednna_core::text::{first_token, normalize_input, PhraseSet};

/// Greeting and farewell detection: the first token is in the token set, or
/// one of the phrases occurs anywhere.
#[derive(Clone, Debug)]
pub struct ShortcutDetector {
    lexicon: Arc<Lexicon>,
}

impl ShortcutDetector {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }

    pub fn is_greeting(&self, text: &str) -> bool {
        let rules = &self.lexicon.shortcuts;
        triggers(text, &rules.greeting_tokens, &rules.greeting_phrases)
    }

    pub fn is_farewell(&self, text: &str) -> bool {
        let rules = &self.lexicon.shortcuts;
        triggers(text, &rules.farewell_tokens, &rules.farewell_phrases)
    }
}

fn triggers(text: &str, first_tokens: &HashSet<String>, phrases: &PhraseSet) -> bool {
    let lowered = normalize_input(text);
    first_token(&lowered).is_some_and(|token| first_tokens.contains(token))
        || phrases.is_match(&lowered)
}
