use std::sync::Arc;

use ednna_core::lexicon::Lexicon;
use ednna_core::text::{normalize_input, tokens};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SafetyCategory {
    Insult,
    Profanity,
    Exfiltration,
    TrickQuestion,
    Absurd,
}

impl SafetyCategory {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Insult => "safety.insult",
            Self::Profanity => "safety.profanity",
            Self::Exfiltration => "safety.exfiltration",
            Self::TrickQuestion => "safety.trick_question",
            Self::Absurd => "safety.absurd",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SafetyDecision {
    Allow,
    Block { category: SafetyCategory, reply: String },
}

#[derive(Clone, Debug)]
pub struct SafetyFilter {
    lexicon: Arc<Lexicon>,
}

impl SafetyFilter {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }

    /// Runs both classifiers and, when either fires, picks the reply of the
    /// highest-priority category present: insult, profanity, exfiltration,
    /// then the generic reply.
    pub fn evaluate(&self, text: &str) -> SafetyDecision {
        let rules = &self.lexicon.safety;
        let lowered = normalize_input(text);

        let category = if rules.insults.is_match(&lowered) {
            SafetyCategory::Insult
        } else if rules.profanity.is_match(&lowered) {
            SafetyCategory::Profanity
        } else if rules.exfiltration.is_match(&lowered) {
            SafetyCategory::Exfiltration
        } else if rules.trick_questions.is_match(&lowered) {
            SafetyCategory::TrickQuestion
        } else if self.is_absurd(&lowered) {
            SafetyCategory::Absurd
        } else {
            return SafetyDecision::Allow;
        };

        let reply = match category {
            SafetyCategory::Insult => &rules.replies.insult,
            SafetyCategory::Profanity => &rules.replies.profanity,
            SafetyCategory::Exfiltration => &rules.replies.exfiltration,
            SafetyCategory::TrickQuestion | SafetyCategory::Absurd => &rules.replies.default,
        };

        SafetyDecision::Block { category, reply: reply.clone() }
    }

    /// A lone out-of-context word, or a known nonsense phrase anywhere.
    fn is_absurd(&self, lowered: &str) -> bool {
        let rules = &self.lexicon.safety;
        let bare = tokens(lowered).join(" ");

        rules.absurd_words.contains_exact(&bare)
            || rules.absurd_phrases.iter().any(|phrase| lowered.contains(phrase.as_str()))
    }
}
