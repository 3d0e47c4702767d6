use ednna_core::domain::knowledge::KnowledgeEntry;
use ednna_core::errors::StoreError;
use ednna_core::store::KnowledgeStore;
use ednna_core::text::word_count;

pub const EXACT_MATCH_CONFIDENCE: f64 = 0.9;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Fulltext,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fulltext => "fulltext",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MatchOutcome {
    Hit { entry: KnowledgeEntry, tier: MatchTier, confidence: f64 },
    Miss,
}

/// Two-tier lookup: substring match on question/keywords, then, for
/// multi-word text only, the store's relevance ranking above a threshold.
#[derive(Clone, Copy, Debug)]
pub struct KnowledgeMatcher {
    fuzzy_threshold: f64,
}

impl KnowledgeMatcher {
    pub fn new(fuzzy_threshold: f64) -> Self {
        Self { fuzzy_threshold }
    }

    pub async fn find(
        &self,
        store: &dyn KnowledgeStore,
        normalized: &str,
    ) -> Result<MatchOutcome, StoreError> {
        let text = normalized.trim();
        if text.is_empty() {
            return Ok(MatchOutcome::Miss);
        }

        if let Some(entry) = store.search_exact(text).await? {
            return Ok(MatchOutcome::Hit {
                entry,
                tier: MatchTier::Exact,
                confidence: EXACT_MATCH_CONFIDENCE,
            });
        }

        if word_count(text) > 1 {
            if let Some((entry, score)) = store.search_fulltext(text).await? {
                if score > self.fuzzy_threshold {
                    return Ok(MatchOutcome::Hit {
                        entry,
                        tier: MatchTier::Fulltext,
                        confidence: score,
                    });
                }
            }
        }

        Ok(MatchOutcome::Miss)
    }
}
