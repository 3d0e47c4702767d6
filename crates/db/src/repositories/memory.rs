use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use chrono::Utc;
use tokio::sync::RwLock;

use ednna_core::domain::conversation::{ConversationId, UserId};
use ednna_core::domain::knowledge::{KnowledgeEntry, PendingQuestion, PendingStatus};
use ednna_core::domain::profile::{ProfilePatch, UserProfile};
use ednna_core::errors::StoreError;
use ednna_core::relevance;
use ednna_core::store::{ConversationLog, KnowledgeStore, PendingStore, ProfileStore};

/// Knowledge store backed by a vector; counts every lookup so callers can
/// assert that a turn never reached the knowledge base.
#[derive(Default)]
pub struct InMemoryKnowledgeRepository {
    entries: RwLock<Vec<KnowledgeEntry>>,
    next_id: AtomicI64,
    lookups: AtomicUsize,
}

impl InMemoryKnowledgeRepository {
    pub async fn upsert(
        &self,
        question: &str,
        answer: &str,
        category: &str,
        keywords: &[&str],
    ) -> i64 {
        let mut entries = self.entries.write().await;
        let keywords = keywords.iter().map(|keyword| keyword.to_string()).collect::<Vec<_>>();
        let updated_at = Utc::now();

        if let Some(entry) = entries.iter_mut().find(|entry| entry.question == question) {
            entry.answer = answer.to_string();
            entry.category = category.to_string();
            entry.keywords = keywords;
            entry.updated_at = updated_at;
            return entry.id;
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        entries.push(KnowledgeEntry {
            id,
            question: question.to_string(),
            answer: answer.to_string(),
            category: category.to_string(),
            keywords,
            updated_at,
        });
        id
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn count_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::SeqCst);
    }
}

fn newest(entries: Vec<&KnowledgeEntry>) -> Option<KnowledgeEntry> {
    entries
        .into_iter()
        .max_by(|left, right| {
            left.updated_at.cmp(&right.updated_at).then_with(|| left.id.cmp(&right.id))
        })
        .cloned()
}

#[async_trait::async_trait]
impl KnowledgeStore for InMemoryKnowledgeRepository {
    async fn search_exact(&self, text: &str) -> Result<Option<KnowledgeEntry>, StoreError> {
        self.count_lookup();
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        let entries = self.entries.read().await;
        Ok(newest(entries.iter().filter(|entry| entry.contains_text(&needle)).collect()))
    }

    async fn search_fulltext(
        &self,
        text: &str,
    ) -> Result<Option<(KnowledgeEntry, f64)>, StoreError> {
        self.count_lookup();
        let entries = self.entries.read().await;
        let best = relevance::best_match(text, entries.iter());
        Ok(best.map(|(entry, score)| (entry.clone(), score)))
    }

    async fn find_by_category(
        &self,
        category: &str,
    ) -> Result<Option<KnowledgeEntry>, StoreError> {
        self.count_lookup();
        let entries = self.entries.read().await;
        Ok(newest(entries.iter().filter(|entry| entry.category == category).collect()))
    }
}

#[derive(Default)]
pub struct InMemoryProfileRepository {
    profiles: RwLock<HashMap<UserId, UserProfile>>,
}

impl InMemoryProfileRepository {
    pub async fn find(&self, user_id: &UserId) -> Option<UserProfile> {
        self.profiles.read().await.get(user_id).cloned()
    }

    pub async fn save(&self, profile: UserProfile) {
        self.profiles.write().await.insert(profile.user_id.clone(), profile);
    }
}

#[async_trait::async_trait]
impl ProfileStore for InMemoryProfileRepository {
    async fn get_or_create(&self, user_id: &UserId) -> Result<UserProfile, StoreError> {
        let mut profiles = self.profiles.write().await;
        let profile =
            profiles.entry(user_id.clone()).or_insert_with(|| UserProfile::new(user_id.clone()));
        Ok(profile.clone())
    }

    async fn update(&self, user_id: &UserId, patch: &ProfilePatch) -> Result<(), StoreError> {
        let mut profiles = self.profiles.write().await;
        if let Some(profile) = profiles.get_mut(user_id) {
            profile.merge(patch);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPendingRepository {
    questions: RwLock<Vec<PendingQuestion>>,
    next_id: AtomicI64,
}

impl InMemoryPendingRepository {
    pub async fn all(&self) -> Vec<PendingQuestion> {
        self.questions.read().await.clone()
    }
}

#[async_trait::async_trait]
impl PendingStore for InMemoryPendingRepository {
    async fn has_recent(
        &self,
        user_id: &UserId,
        question: &str,
        window: chrono::Duration,
    ) -> Result<bool, StoreError> {
        let since = Utc::now() - window;
        let questions = self.questions.read().await;
        Ok(questions.iter().any(|pending| {
            pending.user_id == *user_id
                && pending.question == question
                && pending.created_at > since
        }))
    }

    async fn insert(
        &self,
        user_id: &UserId,
        question: &str,
        conversation_id: ConversationId,
    ) -> Result<(), StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.questions.write().await.push(PendingQuestion {
            id,
            user_id: user_id.clone(),
            question: question.to_string(),
            conversation_id,
            status: PendingStatus::Pending,
            created_at: Utc::now(),
        });
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggedMessage {
    pub conversation_id: ConversationId,
    pub text: String,
    pub is_from_user: bool,
}

#[derive(Default)]
pub struct InMemoryConversationLog {
    active: RwLock<HashMap<UserId, ConversationId>>,
    messages: RwLock<Vec<LoggedMessage>>,
    next_id: AtomicI64,
}

impl InMemoryConversationLog {
    pub async fn messages(&self) -> Vec<LoggedMessage> {
        self.messages.read().await.clone()
    }
}

#[async_trait::async_trait]
impl ConversationLog for InMemoryConversationLog {
    async fn open(&self, user_id: &UserId) -> Result<ConversationId, StoreError> {
        let mut active = self.active.write().await;
        let id = *active.entry(user_id.clone()).or_insert_with(|| {
            ConversationId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
        });
        Ok(id)
    }

    async fn append(
        &self,
        conversation_id: ConversationId,
        text: &str,
        is_from_user: bool,
    ) -> Result<(), StoreError> {
        self.messages.write().await.push(LoggedMessage {
            conversation_id,
            text: text.to_string(),
            is_from_user,
        });
        Ok(())
    }
}
