use ednna_core::domain::conversation::{ConversationId, UserId};
use ednna_core::errors::StoreError;
use ednna_core::store::PendingStore;

#[derive(Clone, Copy, Debug)]
pub struct UnknownQuestionRecorder {
    window: chrono::Duration,
}

impl UnknownQuestionRecorder {
    pub fn new(window: chrono::Duration) -> Self {
        Self { window }
    }

    /// Queues `question` for teaching unless the same user asked the same
    /// thing inside the window. Returns whether a row was written.
    pub async fn record(
        &self,
        store: &dyn PendingStore,
        user_id: &UserId,
        question: &str,
        conversation_id: ConversationId,
    ) -> Result<bool, StoreError> {
        let question = question.trim();
        if question.is_empty() || store.has_recent(user_id, question, self.window).await? {
            return Ok(false);
        }

        store.insert(user_id, question, conversation_id).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use ednna_core::domain::conversation::{ConversationId, UserId};
    use ednna_db::repositories::InMemoryPendingRepository;

    use super::UnknownQuestionRecorder;

    #[tokio::test]
    async fn repeated_question_inside_window_is_recorded_once() {
        let store = InMemoryPendingRepository::default();
        let recorder = UnknownQuestionRecorder::new(Duration::hours(1));
        let user = UserId("u-1".to_string());

        let first = recorder.record(&store, &user, "tem app?", ConversationId(1)).await;
        let second = recorder.record(&store, &user, "tem app?", ConversationId(1)).await;

        assert_eq!(first, Ok(true));
        assert_eq!(second, Ok(false));
        assert_eq!(store.all().await.len(), 1);
    }

    #[tokio::test]
    async fn other_users_and_questions_are_independent() {
        let store = InMemoryPendingRepository::default();
        let recorder = UnknownQuestionRecorder::new(Duration::hours(1));

        let ana = UserId("ana".to_string());
        let bia = UserId("bia".to_string());
        recorder.record(&store, &ana, "tem app?", ConversationId(1)).await.expect("ana");
        recorder.record(&store, &bia, "tem app?", ConversationId(2)).await.expect("bia");
        recorder.record(&store, &ana, "tem api?", ConversationId(1)).await.expect("ana api");

        assert_eq!(store.all().await.len(), 3);
    }

    #[tokio::test]
    async fn zero_window_never_deduplicates() {
        let store = InMemoryPendingRepository::default();
        let recorder = UnknownQuestionRecorder::new(Duration::zero());
        let user = UserId("u-1".to_string());

        recorder.record(&store, &user, "tem app?", ConversationId(1)).await.expect("first");
        recorder.record(&store, &user, "tem app?", ConversationId(1)).await.expect("second");

        assert_eq!(store.all().await.len(), 2);
    }

    #[tokio::test]
    async fn blank_questions_are_ignored() {
        let store = InMemoryPendingRepository::default();
        let recorder = UnknownQuestionRecorder::new(Duration::hours(1));

        let written = recorder
            .record(&store, &UserId("u-1".to_string()), "  ", ConversationId(1))
            .await;
        assert_eq!(written, Ok(false));
        assert!(store.all().await.is_empty());
    }
}
