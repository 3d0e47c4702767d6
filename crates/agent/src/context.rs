use std::sync::Arc;

use ednna_core::domain::conversation::{user_turns_newest_first, ConversationTurn};
use ednna_core::lexicon::{Lexicon, TopicRule};
use ednna_core::text::{normalize_input, word_count};

use crate::normalizer::TermNormalizer;

/// Follow-ups this short may lean on the previous user turn.
pub const MAX_FOLLOW_UP_WORDS: usize = 2;

/// Topic detection over conversation text, and the rewrite of short
/// follow-ups ("e?", "como assim") into the topic's canonical question.
#[derive(Clone, Debug)]
pub struct ContextResolver {
    lexicon: Arc<Lexicon>,
    normalizer: TermNormalizer,
}

impl ContextResolver {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        let normalizer = TermNormalizer::new(lexicon.clone());
        Self { lexicon, normalizer }
    }

    pub fn topic_of(&self, text: &str) -> Option<&TopicRule> {
        self.lexicon.detect_topic(&self.normalizer.normalize(text))
    }

    /// Topic of the follow-up target, when `text` is a short utterance
    /// carrying one of that topic's confirmatory cues.
    pub fn resolve(&self, text: &str, history: &[ConversationTurn]) -> Option<&TopicRule> {
        if word_count(text) > MAX_FOLLOW_UP_WORDS {
            return None;
        }
        let previous = user_turns_newest_first(history).next()?;
        let topic = self.topic_of(previous)?;

        topic.cues.is_match(&normalize_input(text)).then_some(topic)
    }

    /// Most recent topic in the conversation: the current text first, then
    /// prior user turns newest first.
    pub fn last_topic(&self, text: &str, history: &[ConversationTurn]) -> Option<&TopicRule> {
        std::iter::once(text)
            .chain(user_turns_newest_first(history))
            .find_map(|turn| self.topic_of(turn))
    }
}
