use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use ednna_core::config::PipelineConfig;
use ednna_core::domain::chat::{ChatResult, Intent};
use ednna_core::domain::conversation::{ConversationId, ConversationTurn, UserId};
use ednna_core::errors::StoreError;
use ednna_core::lexicon::Lexicon;
use ednna_core::store::{ConversationLog, KnowledgeStore, PendingStore, ProfileStore};

use crate::composer::ResponseComposer;
use crate::context::ContextResolver;
use crate::matcher::KnowledgeMatcher;
use crate::normalizer::TermNormalizer;
use crate::pipeline::{
    ComposeStage, ContextStage, FarewellStage, GreetingStage, KnowledgeStage, NormalizeStage,
    Pipeline, ProfileStage, RecordUnknownStage, SafetyStage, TurnContext,
};
use crate::profile::ProfileExtractor;
use crate::recorder::UnknownQuestionRecorder;
use crate::safety::SafetyFilter;
use crate::shortcuts::ShortcutDetector;

pub const ERROR_CONFIDENCE: f64 = 0.0;

/// Store handles the orchestrator talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub knowledge: Arc<dyn KnowledgeStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub pending: Arc<dyn PendingStore>,
    pub conversations: Arc<dyn ConversationLog>,
}

pub struct DialogueOrchestrator {
    pipeline: Pipeline,
    profiles: Arc<dyn ProfileStore>,
    conversations: Arc<dyn ConversationLog>,
    composer: ResponseComposer,
}

impl DialogueOrchestrator {
    pub fn new(lexicon: Arc<Lexicon>, config: &PipelineConfig, stores: Collaborators) -> Self {
        let resolver = ContextResolver::new(lexicon.clone());
        let detector = ShortcutDetector::new(lexicon.clone());
        let composer = ResponseComposer::new(lexicon.clone());

        let mut pipeline = Pipeline::default();
        pipeline.register(ContextStage::new(resolver.clone()));
        pipeline.register(SafetyStage::new(SafetyFilter::new(lexicon.clone())));
        pipeline.register(GreetingStage::new(
            detector.clone(),
            composer.clone(),
            stores.knowledge.clone(),
        ));
        pipeline.register(FarewellStage::new(detector, composer.clone()));
        pipeline.register(ProfileStage::new(
            ProfileExtractor::new(lexicon.clone()),
            resolver.clone(),
            stores.profiles.clone(),
        ));
        pipeline.register(NormalizeStage::new(TermNormalizer::new(lexicon)));
        pipeline.register(KnowledgeStage::new(
            KnowledgeMatcher::new(config.fuzzy_threshold),
            stores.knowledge,
        ));
        pipeline.register(RecordUnknownStage::new(
            UnknownQuestionRecorder::new(config.pending_window()),
            stores.pending,
        ));
        pipeline.register(ComposeStage::new(composer.clone(), resolver));

        Self {
            pipeline,
            profiles: stores.profiles,
            conversations: stores.conversations,
            composer,
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.pipeline.names()
    }

    /// Resolves one utterance into exactly one result. Store failures become
    /// the `error` result; the raw utterance and the reply are appended to
    /// the conversation log whenever a conversation could be opened.
    pub async fn process_turn(
        &self,
        utterance: &str,
        user_id: &UserId,
        history: &[ConversationTurn],
    ) -> ChatResult {
        let correlation_id = Uuid::new_v4().to_string();
        info!(
            event_name = "chat.turn.received",
            correlation_id = %correlation_id,
            user_id = %user_id,
            history_len = history.len(),
            "turn received"
        );

        let conversation_id = match self.conversations.open(user_id).await {
            Ok(conversation_id) => conversation_id,
            Err(error) => return self.failed(&correlation_id, &error),
        };

        let result = self
            .run(&correlation_id, utterance, user_id, conversation_id, history)
            .await
            .unwrap_or_else(|error| self.failed(&correlation_id, &error));

        self.log_exchange(&correlation_id, conversation_id, utterance, &result.response).await;

        info!(
            event_name = "chat.turn.completed",
            correlation_id = %correlation_id,
            conversation_id = %conversation_id,
            intent = %result.intent,
            confidence = result.confidence,
            "turn completed"
        );
        result
    }

    async fn run(
        &self,
        correlation_id: &str,
        utterance: &str,
        user_id: &UserId,
        conversation_id: ConversationId,
        history: &[ConversationTurn],
    ) -> Result<ChatResult, StoreError> {
        let profile = self.profiles.get_or_create(user_id).await?;
        let mut turn =
            TurnContext::new(correlation_id, user_id, conversation_id, utterance, history, profile);

        match self.pipeline.run(&mut turn).await? {
            Some(result) => Ok(result),
            None => {
                warn!(
                    event_name = "chat.turn.unhandled",
                    correlation_id = %correlation_id,
                    "no stage produced a result"
                );
                Ok(self.error_result())
            }
        }
    }

    fn failed(&self, correlation_id: &str, error: &StoreError) -> ChatResult {
        warn!(
            event_name = "chat.turn.failed",
            correlation_id = %correlation_id,
            store = error.store(),
            error = %error,
            "turn failed on store access"
        );
        self.error_result()
    }

    fn error_result(&self) -> ChatResult {
        ChatResult::new(self.composer.error_reply(), Intent::Error, ERROR_CONFIDENCE)
    }

    /// Best effort: a failed append is reported and otherwise ignored.
    async fn log_exchange(
        &self,
        correlation_id: &str,
        conversation_id: ConversationId,
        utterance: &str,
        response: &str,
    ) {
        for (text, is_from_user) in [(utterance, true), (response, false)] {
            if let Err(error) = self.conversations.append(conversation_id, text, is_from_user).await
            {
                warn!(
                    event_name = "chat.log.append_failed",
                    correlation_id = %correlation_id,
                    conversation_id = %conversation_id,
                    is_from_user,
                    error = %error,
                    "could not append message to conversation log"
                );
            }
        }
    }
}
