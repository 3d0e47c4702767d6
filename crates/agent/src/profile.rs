use std::sync::Arc;

use regex::Regex;

use ednna_core::domain::profile::{ProfilePatch, UserProfile};
use ednna_core::lexicon::Lexicon;
use ednna_core::text::{normalize_input, title_case};

/// Pulls profile attributes out of free text. Only fields that are still
/// empty on the current profile are extracted.
#[derive(Clone, Debug)]
pub struct ProfileExtractor {
    lexicon: Arc<Lexicon>,
}

impl ProfileExtractor {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }

    pub fn extract(&self, text: &str, profile: &UserProfile) -> ProfilePatch {
        let rules = &self.lexicon.profile;
        let lowered = normalize_input(text);
        let mut patch = ProfilePatch::default();

        if profile.name.is_none() {
            patch.name = self.capture(&rules.name_patterns, &lowered).map(|name| title_case(&name));
        }
        if profile.company.is_none() {
            patch.company = self.capture(&rules.company_patterns, &lowered).map(|company| {
                rules
                    .company_aliases
                    .exact(&company)
                    .map(str::to_string)
                    .unwrap_or_else(|| title_case(&company))
            });
        }
        if profile.erp_vendor.is_none() {
            patch.erp_vendor = rules.erp_vendors.lookup(&lowered).map(str::to_string);
        }
        if profile.acquirer.is_none() {
            patch.acquirer = rules.acquirers.lookup(&lowered).map(str::to_string);
        }

        patch
    }

    /// First captured token, across patterns in order, that is not a stopword.
    fn capture(&self, patterns: &[Regex], lowered: &str) -> Option<String> {
        let stopwords = &self.lexicon.profile.stopwords;

        patterns
            .iter()
            .flat_map(|pattern| pattern.captures_iter(lowered))
            .filter_map(|captures| captures.get(1).map(|found| found.as_str()))
            .find(|candidate| {
                !stopwords.contains(*candidate)
                    && !candidate.chars().all(|c| c.is_ascii_digit() || c == '_')
            })
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ednna_core::domain::conversation::UserId;
    use ednna_core::domain::profile::{ProfilePatch, UserProfile};
    use ednna_core::lexicon::Lexicon;

    use super::ProfileExtractor;

    fn extractor() -> ProfileExtractor {
        ProfileExtractor::new(Arc::new(Lexicon::builtin().expect("builtin lexicon")))
    }

    fn empty_profile() -> UserProfile {
        UserProfile::new(UserId("u-1".to_string()))
    }

    #[test]
    fn extracts_title_cased_name() {
        let patch = extractor().extract("Oi, meu nome é JOÃO e preciso de ajuda", &empty_profile());
        assert_eq!(patch.name.as_deref(), Some("João"));
    }

    #[test]
    fn stopwords_are_never_taken_as_names() {
        let extractor = extractor();

        let patch = extractor.extract("eu sou o responsável pelo financeiro", &empty_profile());
        assert_eq!(patch.name, None);

        let patch = extractor.extract("aqui é a Mariana, do financeiro", &empty_profile());
        assert_eq!(patch.name.as_deref(), Some("Mariana"));
    }

    #[test]
    fn company_uses_alias_table_then_title_case() {
        let extractor = extractor();

        let patch = extractor.extract("trabalho na magalu", &empty_profile());
        assert_eq!(patch.company.as_deref(), Some("Magazine Luiza"));

        let patch = extractor.extract("a Acme Ltda usa o teia card", &empty_profile());
        assert_eq!(patch.company.as_deref(), Some("Acme"));

        let patch = extractor.extract("minha empresa é a padaria", &empty_profile());
        assert_eq!(patch.company.as_deref(), Some("Padaria"));
    }

    #[test]
    fn erp_and_acquirer_come_from_alias_dictionaries() {
        let patch =
            extractor().extract("usamos protheus e recebemos pela cielo", &empty_profile());

        assert_eq!(patch.erp_vendor.as_deref(), Some("TOTVS"));
        assert_eq!(patch.acquirer.as_deref(), Some("Cielo"));
    }

    #[test]
    fn known_fields_are_not_extracted_again() {
        let mut profile = empty_profile();
        profile.name = Some("Ana".to_string());
        profile.erp_vendor = Some("SAP".to_string());

        let patch = extractor().extract("meu nome é Bruno e usamos o protheus", &profile);
        assert_eq!(patch, ProfilePatch::default());
    }

    #[test]
    fn plain_questions_yield_an_empty_patch() {
        let patch = extractor().extract("como funciona a integração edi?", &empty_profile());
        assert!(patch.is_empty());
    }
}
