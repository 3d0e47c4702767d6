use std::sync::Arc;

use ednna_core::domain::knowledge::KnowledgeEntry;
use ednna_core::domain::profile::UserProfile;
use ednna_core::lexicon::{Lexicon, TopicRule};

/// Builds reply text from the lexicon templates and what the profile knows.
#[derive(Clone, Debug)]
pub struct ResponseComposer {
    lexicon: Arc<Lexicon>,
}

impl ResponseComposer {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }

    /// Name greeting, then the company clause. Empty when no name is known.
    pub fn personalization(&self, profile: &UserProfile) -> String {
        let templates = &self.lexicon.composer;
        let Some(name) = profile.name.as_deref() else {
            return String::new();
        };

        let mut prefix = templates.name_prefix.replace("{name}", name);
        if let Some(company) = profile.company.as_deref() {
            prefix.push_str(&templates.company_clause.replace("{company}", company));
        }
        prefix
    }

    pub fn answer(&self, profile: &UserProfile, entry: &KnowledgeEntry) -> String {
        format!("{}{}", self.personalization(profile), entry.answer)
    }

    pub fn apology(&self, profile: &UserProfile, topic: Option<&TopicRule>) -> String {
        let templates = &self.lexicon.composer;
        let suggestion = topic.map_or(templates.default_suggestion.as_str(), |topic| {
            topic.suggestion.as_str()
        });
        format!("{}{} {}", self.personalization(profile), templates.apology, suggestion)
    }

    pub fn greeting(&self, profile: &UserProfile, entry: Option<&KnowledgeEntry>) -> String {
        let body = entry.map_or(self.lexicon.shortcuts.fallback_greeting.as_str(), |entry| {
            entry.answer.as_str()
        });
        format!("{}{}", self.personalization(profile), body)
    }

    pub fn farewell(&self, profile: &UserProfile) -> String {
        let shortcuts = &self.lexicon.shortcuts;
        match profile.name.as_deref() {
            Some(name) => shortcuts.farewell_named.replace("{name}", name),
            None => shortcuts.farewell_anonymous.clone(),
        }
    }

    pub fn error_reply(&self) -> &str {
        &self.lexicon.composer.error_reply
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use ednna_core::domain::conversation::UserId;
    use ednna_core::domain::knowledge::KnowledgeEntry;
    use ednna_core::domain::profile::UserProfile;
    use ednna_core::lexicon::Lexicon;

    use super::ResponseComposer;

    fn composer() -> (ResponseComposer, Arc<Lexicon>) {
        let lexicon = Arc::new(Lexicon::builtin().expect("builtin lexicon"));
        (ResponseComposer::new(lexicon.clone()), lexicon)
    }

    fn profile(name: Option<&str>, company: Option<&str>) -> UserProfile {
        let mut profile = UserProfile::new(UserId("u-1".to_string()));
        profile.name = name.map(str::to_string);
        profile.company = company.map(str::to_string);
        profile
    }

    fn entry(answer: &str) -> KnowledgeEntry {
        KnowledgeEntry {
            id: 1,
            question: "O que é o Teia Card?".to_string(),
            answer: answer.to_string(),
            category: "produto".to_string(),
            keywords: vec!["teia card".to_string()],
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn prefix_includes_company_only_alongside_a_name() {
        let (composer, _) = composer();

        assert_eq!(composer.personalization(&profile(None, Some("Acme"))), "");
        assert_eq!(composer.personalization(&profile(Some("Ana"), None)), "Olá, Ana! ");
        assert_eq!(
            composer.personalization(&profile(Some("Ana"), Some("Acme"))),
            "Olá, Ana! Vejo que você é da Acme. "
        );
    }

    #[test]
    fn answers_are_prefixed_when_a_name_is_known() {
        let (composer, _) = composer();

        let text = composer.answer(&profile(Some("Ana"), None), &entry("É a plataforma."));
        assert_eq!(text, "Olá, Ana! É a plataforma.");
        let text = composer.answer(&profile(None, None), &entry("É a plataforma."));
        assert_eq!(text, "É a plataforma.");
    }

    #[test]
    fn apology_carries_the_topic_suggestion_or_the_default() {
        let (composer, lexicon) = composer();
        let topic = lexicon.topic("edi").expect("edi topic");

        let text = composer.apology(&profile(None, None), Some(topic));
        assert_eq!(text, format!("{} {}", lexicon.composer.apology, topic.suggestion));

        let text = composer.apology(&profile(None, None), None);
        assert!(text.ends_with(&lexicon.composer.default_suggestion));
    }

    #[test]
    fn greeting_falls_back_when_no_entry_exists() {
        let (composer, lexicon) = composer();

        let text = composer.greeting(&profile(None, None), None);
        assert_eq!(text, lexicon.shortcuts.fallback_greeting);

        let text = composer.greeting(&profile(Some("Ana"), None), Some(&entry("Sou a Ednna.")));
        assert_eq!(text, "Olá, Ana! Sou a Ednna.");
    }

    #[test]
    fn farewell_uses_the_name_when_known() {
        let (composer, lexicon) = composer();

        assert!(composer.farewell(&profile(Some("Ana"), None)).contains("Ana"));
        assert_eq!(composer.farewell(&profile(None, None)), lexicon.shortcuts.farewell_anonymous);
    }
}
