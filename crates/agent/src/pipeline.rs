use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use ednna_core::domain::chat::{ChatResult, Intent, GREETING_CATEGORY};
use ednna_core::domain::conversation::{ConversationId, ConversationTurn, UserId};
use ednna_core::domain::profile::UserProfile;
use ednna_core::errors::StoreError;
use ednna_core::store::{KnowledgeStore, PendingStore, ProfileStore};

use crate::composer::ResponseComposer;
use crate::context::ContextResolver;
use crate::matcher::{KnowledgeMatcher, MatchOutcome};
use crate::normalizer::TermNormalizer;
use crate::profile::ProfileExtractor;
use crate::recorder::UnknownQuestionRecorder;
use crate::safety::{SafetyDecision, SafetyFilter};
use crate::shortcuts::ShortcutDetector;

pub const FILTERED_CONFIDENCE: f64 = 0.99;
pub const SHORTCUT_CONFIDENCE: f64 = 0.95;
pub const UNKNOWN_CONFIDENCE: f64 = 0.2;

/// Mutable state of one turn as it moves through the stages.
pub struct TurnContext<'a> {
    pub correlation_id: &'a str,
    pub user_id: &'a UserId,
    pub conversation_id: ConversationId,
    /// Raw utterance: safety, profile extraction and logging read this.
    pub utterance: &'a str,
    pub history: &'a [ConversationTurn],
    /// Utterance after follow-up rewriting.
    pub resolved: String,
    /// `resolved` after term normalization; what the knowledge base sees.
    pub normalized: String,
    pub profile: UserProfile,
    pub matched: Option<MatchOutcome>,
}

impl<'a> TurnContext<'a> {
    pub fn new(
        correlation_id: &'a str,
        user_id: &'a UserId,
        conversation_id: ConversationId,
        utterance: &'a str,
        history: &'a [ConversationTurn],
        profile: UserProfile,
    ) -> Self {
        Self {
            correlation_id,
            user_id,
            conversation_id,
            utterance,
            history,
            resolved: utterance.to_string(),
            normalized: String::new(),
            profile,
            matched: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StageOutcome {
    Continue,
    Handled(ChatResult),
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;
    async fn attempt(&self, turn: &mut TurnContext<'_>) -> Result<StageOutcome, StoreError>;
}

/// Ordered stages; the first one to handle the turn produces the result.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn register<S>(&mut self, stage: S)
    where
        S: Stage + 'static,
    {
        self.stages.push(Box::new(stage));
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub async fn run(&self, turn: &mut TurnContext<'_>) -> Result<Option<ChatResult>, StoreError> {
        let correlation_id = turn.correlation_id;
        for stage in &self.stages {
            let outcome = stage.attempt(turn).await.map_err(|error| {
                warn!(
                    event_name = "chat.stage.failed",
                    correlation_id = %correlation_id,
                    stage = stage.name(),
                    store = error.store(),
                    error = %error,
                    "stage failed"
                );
                error
            })?;

            if let StageOutcome::Handled(result) = outcome {
                debug!(
                    event_name = "chat.stage.handled",
                    correlation_id = %correlation_id,
                    stage = stage.name(),
                    intent = %result.intent,
                    "stage handled turn"
                );
                return Ok(Some(result));
            }
        }
        Ok(None)
    }
}

pub struct ContextStage {
    resolver: ContextResolver,
}

impl ContextStage {
    pub fn new(resolver: ContextResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Stage for ContextStage {
    fn name(&self) -> &'static str {
        "context"
    }

    async fn attempt(&self, turn: &mut TurnContext<'_>) -> Result<StageOutcome, StoreError> {
        if let Some(topic) = self.resolver.resolve(turn.utterance, turn.history) {
            debug!(
                event_name = "chat.context.rewritten",
                correlation_id = %turn.correlation_id,
                topic = %topic.id,
                "follow-up rewritten to canonical question"
            );
            turn.resolved = topic.canonical_question.clone();
        }
        Ok(StageOutcome::Continue)
    }
}

pub struct SafetyStage {
    filter: SafetyFilter,
}

impl SafetyStage {
    pub fn new(filter: SafetyFilter) -> Self {
        Self { filter }
    }
}

#[async_trait]
impl Stage for SafetyStage {
    fn name(&self) -> &'static str {
        "safety"
    }

    async fn attempt(&self, turn: &mut TurnContext<'_>) -> Result<StageOutcome, StoreError> {
        match self.filter.evaluate(turn.utterance) {
            SafetyDecision::Allow => Ok(StageOutcome::Continue),
            SafetyDecision::Block { category, reply } => {
                info!(
                    event_name = "chat.safety.blocked",
                    correlation_id = %turn.correlation_id,
                    reason_code = category.reason_code(),
                    "utterance filtered"
                );
                Ok(StageOutcome::Handled(ChatResult::new(
                    reply,
                    Intent::Filtered,
                    FILTERED_CONFIDENCE,
                )))
            }
        }
    }
}

pub struct GreetingStage {
    detector: ShortcutDetector,
    composer: ResponseComposer,
    knowledge: Arc<dyn KnowledgeStore>,
}

impl GreetingStage {
    pub fn new(
        detector: ShortcutDetector,
        composer: ResponseComposer,
        knowledge: Arc<dyn KnowledgeStore>,
    ) -> Self {
        Self { detector, composer, knowledge }
    }
}

#[async_trait]
impl Stage for GreetingStage {
    fn name(&self) -> &'static str {
        "greeting"
    }

    async fn attempt(&self, turn: &mut TurnContext<'_>) -> Result<StageOutcome, StoreError> {
        if !self.detector.is_greeting(&turn.resolved) {
            return Ok(StageOutcome::Continue);
        }

        let entry = self.knowledge.find_by_category(GREETING_CATEGORY).await?;
        let response = self.composer.greeting(&turn.profile, entry.as_ref());
        Ok(StageOutcome::Handled(ChatResult::new(response, Intent::Greeting, SHORTCUT_CONFIDENCE)))
    }
}

pub struct FarewellStage {
    detector: ShortcutDetector,
    composer: ResponseComposer,
}

impl FarewellStage {
    pub fn new(detector: ShortcutDetector, composer: ResponseComposer) -> Self {
        Self { detector, composer }
    }
}

#[async_trait]
impl Stage for FarewellStage {
    fn name(&self) -> &'static str {
        "farewell"
    }

    async fn attempt(&self, turn: &mut TurnContext<'_>) -> Result<StageOutcome, StoreError> {
        if !self.detector.is_farewell(&turn.resolved) {
            return Ok(StageOutcome::Continue);
        }

        let response = self.composer.farewell(&turn.profile);
        Ok(StageOutcome::Handled(ChatResult::new(response, Intent::Farewell, SHORTCUT_CONFIDENCE)))
    }
}

/// Fills empty profile fields from the utterance and tracks the latest
/// issue topic. Never handles the turn.
pub struct ProfileStage {
    extractor: ProfileExtractor,
    resolver: ContextResolver,
    profiles: Arc<dyn ProfileStore>,
}

impl ProfileStage {
    pub fn new(
        extractor: ProfileExtractor,
        resolver: ContextResolver,
        profiles: Arc<dyn ProfileStore>,
    ) -> Self {
        Self { extractor, resolver, profiles }
    }
}

#[async_trait]
impl Stage for ProfileStage {
    fn name(&self) -> &'static str {
        "profile"
    }

    async fn attempt(&self, turn: &mut TurnContext<'_>) -> Result<StageOutcome, StoreError> {
        let mut patch = self.extractor.extract(turn.utterance, &turn.profile);

        if let Some(topic) = self.resolver.topic_of(&turn.resolved).filter(|topic| topic.issue) {
            if turn.profile.last_issue.as_deref() != Some(topic.id.as_str()) {
                patch.last_issue = Some(topic.id.clone());
            }
        }

        if patch.is_empty() {
            return Ok(StageOutcome::Continue);
        }

        self.profiles.update(turn.user_id, &patch).await?;
        turn.profile.merge(&patch);
        debug!(
            event_name = "chat.profile.updated",
            correlation_id = %turn.correlation_id,
            user_id = %turn.user_id,
            name = patch.name.is_some(),
            company = patch.company.is_some(),
            erp_vendor = patch.erp_vendor.is_some(),
            acquirer = patch.acquirer.is_some(),
            last_issue = patch.last_issue.as_deref().unwrap_or(""),
            "profile updated"
        );
        Ok(StageOutcome::Continue)
    }
}

pub struct NormalizeStage {
    normalizer: TermNormalizer,
}

impl NormalizeStage {
    pub fn new(normalizer: TermNormalizer) -> Self {
        Self { normalizer }
    }
}

#[async_trait]
impl Stage for NormalizeStage {
    fn name(&self) -> &'static str {
        "normalize"
    }

    async fn attempt(&self, turn: &mut TurnContext<'_>) -> Result<StageOutcome, StoreError> {
        turn.normalized = self.normalizer.normalize(&turn.resolved);
        Ok(StageOutcome::Continue)
    }
}

pub struct KnowledgeStage {
    matcher: KnowledgeMatcher,
    knowledge: Arc<dyn KnowledgeStore>,
}

impl KnowledgeStage {
    pub fn new(matcher: KnowledgeMatcher, knowledge: Arc<dyn KnowledgeStore>) -> Self {
        Self { matcher, knowledge }
    }
}

#[async_trait]
impl Stage for KnowledgeStage {
    fn name(&self) -> &'static str {
        "knowledge"
    }

    async fn attempt(&self, turn: &mut TurnContext<'_>) -> Result<StageOutcome, StoreError> {
        let outcome = self.matcher.find(self.knowledge.as_ref(), &turn.normalized).await?;
        match &outcome {
            MatchOutcome::Hit { entry, tier, confidence } => debug!(
                event_name = "chat.knowledge.hit",
                correlation_id = %turn.correlation_id,
                entry_id = entry.id,
                tier = tier.as_str(),
                confidence = *confidence,
                "knowledge entry matched"
            ),
            MatchOutcome::Miss => debug!(
                event_name = "chat.knowledge.miss",
                correlation_id = %turn.correlation_id,
                "no knowledge entry matched"
            ),
        }
        turn.matched = Some(outcome);
        Ok(StageOutcome::Continue)
    }
}

pub struct RecordUnknownStage {
    recorder: UnknownQuestionRecorder,
    pending: Arc<dyn PendingStore>,
}

impl RecordUnknownStage {
    pub fn new(recorder: UnknownQuestionRecorder, pending: Arc<dyn PendingStore>) -> Self {
        Self { recorder, pending }
    }
}

#[async_trait]
impl Stage for RecordUnknownStage {
    fn name(&self) -> &'static str {
        "record_unknown"
    }

    async fn attempt(&self, turn: &mut TurnContext<'_>) -> Result<StageOutcome, StoreError> {
        if !matches!(turn.matched, Some(MatchOutcome::Miss)) {
            return Ok(StageOutcome::Continue);
        }

        let written = self
            .recorder
            .record(self.pending.as_ref(), turn.user_id, turn.utterance, turn.conversation_id)
            .await?;
        if written {
            info!(
                event_name = "chat.unknown.recorded",
                correlation_id = %turn.correlation_id,
                user_id = %turn.user_id,
                conversation_id = %turn.conversation_id,
                "unknown question queued for teaching"
            );
        }
        Ok(StageOutcome::Continue)
    }
}

pub struct ComposeStage {
    composer: ResponseComposer,
    resolver: ContextResolver,
}

impl ComposeStage {
    pub fn new(composer: ResponseComposer, resolver: ContextResolver) -> Self {
        Self { composer, resolver }
    }
}

#[async_trait]
impl Stage for ComposeStage {
    fn name(&self) -> &'static str {
        "compose"
    }

    async fn attempt(&self, turn: &mut TurnContext<'_>) -> Result<StageOutcome, StoreError> {
        let result = match turn.matched.take() {
            Some(MatchOutcome::Hit { entry, confidence, .. }) => ChatResult::new(
                self.composer.answer(&turn.profile, &entry),
                Intent::from(entry.category),
                confidence,
            ),
            Some(MatchOutcome::Miss) | None => {
                let topic = self.resolver.last_topic(&turn.resolved, turn.history);
                ChatResult::new(
                    self.composer.apology(&turn.profile, topic),
                    Intent::Unknown,
                    UNKNOWN_CONFIDENCE,
                )
            }
        };
        Ok(StageOutcome::Handled(result))
    }
}
