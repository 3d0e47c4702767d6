//! Rule tables that drive the pipeline: term corrections, safety lists,
//! greeting/farewell sets, profile extraction rules, topics and reply
//! templates.
//!
//! Tables are plain TOML (`config/lexicon.toml` is the built-in default) and
//! are compiled once into [`Lexicon`] so every rule evaluated per turn is a
//! prebuilt matcher.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::text::{normalize_input, PhraseError, PhraseSet};

const BUILTIN_LEXICON: &str = include_str!("../../../config/lexicon.toml");

#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("could not read lexicon file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse lexicon: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid phrase in `{table}`: {source}")]
    Phrase {
        table: &'static str,
        #[source]
        source: PhraseError,
    },
    #[error("invalid pattern in `{table}`: `{pattern}`: {source}")]
    Pattern {
        table: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("lexicon validation failed: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LexiconConfig {
    pub normalizer: NormalizerTable,
    pub safety: SafetyTable,
    pub shortcuts: ShortcutTable,
    pub profile: ProfileTable,
    pub composer: ComposerTable,
    pub topics: Vec<TopicTable>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NormalizerTable {
    pub terms: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SafetyTable {
    pub absurd_words: Vec<String>,
    pub absurd_phrases: Vec<String>,
    pub profanity: Vec<String>,
    pub insults: Vec<String>,
    pub trick_questions: Vec<String>,
    pub exfiltration: Vec<String>,
    pub replies: SafetyReplies,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SafetyReplies {
    pub insult: String,
    pub profanity: String,
    pub exfiltration: String,
    pub default: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShortcutTable {
    pub greeting_tokens: Vec<String>,
    pub greeting_phrases: Vec<String>,
    pub farewell_tokens: Vec<String>,
    pub farewell_phrases: Vec<String>,
    pub fallback_greeting: String,
    pub farewell_named: String,
    pub farewell_anonymous: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileTable {
    pub name_patterns: Vec<String>,
    pub company_patterns: Vec<String>,
    pub stopwords: Vec<String>,
    pub company_aliases: BTreeMap<String, String>,
    pub erp_vendors: BTreeMap<String, String>,
    pub acquirers: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComposerTable {
    pub name_prefix: String,
    pub company_clause: String,
    pub apology: String,
    pub default_suggestion: String,
    pub error_reply: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopicTable {
    pub id: String,
    pub keywords: Vec<String>,
    pub cues: Vec<String>,
    pub canonical_question: String,
    pub suggestion: String,
    #[serde(default)]
    pub issue: bool,
}

impl LexiconConfig {
    pub fn builtin() -> Result<Self, LexiconError> {
        Self::from_toml_str(BUILTIN_LEXICON)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, LexiconError> {
        Ok(toml::from_str::<Self>(raw)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, LexiconError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| LexiconError::ReadFile { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&raw)
    }
}

/// Whole-word alias lookup: each alias maps to one canonical label.
#[derive(Clone, Debug)]
pub struct AliasTable {
    aliases: PhraseSet,
    labels: HashMap<String, String>,
}

impl AliasTable {
    fn compile(
        table: &'static str,
        entries: &BTreeMap<String, String>,
    ) -> Result<Self, LexiconError> {
        let labels = entries
            .iter()
            .map(|(alias, label)| (normalize_input(alias), label.clone()))
            .collect::<HashMap<_, _>>();
        let aliases = PhraseSet::new(labels.keys())
            .map_err(|source| LexiconError::Phrase { table, source })?;
        Ok(Self { aliases, labels })
    }

    /// Label of the leftmost alias occurring in `text`.
    pub fn lookup(&self, text: &str) -> Option<&str> {
        let found = self.aliases.find(text)?;
        self.labels.get(&normalize_input(found)).map(String::as_str)
    }

    /// Label for `text` as a whole, if it is itself an alias.
    pub fn exact(&self, text: &str) -> Option<&str> {
        self.labels.get(&normalize_input(text)).map(String::as_str)
    }

    pub fn replace_all(&self, text: &str) -> String {
        self.aliases.replace_all(text, |found| {
            self.labels.get(&normalize_input(found)).cloned().unwrap_or_else(|| found.to_string())
        })
    }
}

#[derive(Clone, Debug)]
pub struct SafetyRules {
    pub absurd_words: PhraseSet,
    pub absurd_phrases: Vec<String>,
    pub profanity: PhraseSet,
    pub insults: PhraseSet,
    pub trick_questions: PhraseSet,
    pub exfiltration: PhraseSet,
    pub replies: SafetyReplies,
}

#[derive(Clone, Debug)]
pub struct ShortcutRules {
    pub greeting_tokens: HashSet<String>,
    pub greeting_phrases: PhraseSet,
    pub farewell_tokens: HashSet<String>,
    pub farewell_phrases: PhraseSet,
    pub fallback_greeting: String,
    pub farewell_named: String,
    pub farewell_anonymous: String,
}

#[derive(Clone, Debug)]
pub struct ProfileRules {
    pub name_patterns: Vec<Regex>,
    pub company_patterns: Vec<Regex>,
    pub stopwords: HashSet<String>,
    pub company_aliases: AliasTable,
    pub erp_vendors: AliasTable,
    pub acquirers: AliasTable,
}

#[derive(Clone, Debug)]
pub struct ComposerTemplates {
    pub name_prefix: String,
    pub company_clause: String,
    pub apology: String,
    pub default_suggestion: String,
    pub error_reply: String,
}

#[derive(Clone, Debug)]
pub struct TopicRule {
    pub id: String,
    pub keywords: PhraseSet,
    pub cues: PhraseSet,
    pub canonical_question: String,
    pub suggestion: String,
    pub issue: bool,
}

#[derive(Clone, Debug)]
pub struct Lexicon {
    pub terms: AliasTable,
    pub safety: SafetyRules,
    pub shortcuts: ShortcutRules,
    pub profile: ProfileRules,
    pub composer: ComposerTemplates,
    pub topics: Vec<TopicRule>,
}

impl Lexicon {
    pub fn builtin() -> Result<Self, LexiconError> {
        Self::compile(LexiconConfig::builtin()?)
    }

    /// Loads `path` when given, the built-in tables otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, LexiconError> {
        match path {
            Some(path) => Self::compile(LexiconConfig::from_path(path)?),
            None => Self::builtin(),
        }
    }

    pub fn compile(config: LexiconConfig) -> Result<Self, LexiconError> {
        let safety = SafetyRules {
            absurd_words: phrase_set("safety.absurd_words", &config.safety.absurd_words)?,
            absurd_phrases: config
                .safety
                .absurd_phrases
                .iter()
                .map(|phrase| normalize_input(phrase))
                .filter(|phrase| !phrase.is_empty())
                .collect(),
            profanity: phrase_set("safety.profanity", &config.safety.profanity)?,
            insults: phrase_set("safety.insults", &config.safety.insults)?,
            trick_questions: phrase_set("safety.trick_questions", &config.safety.trick_questions)?,
            exfiltration: phrase_set("safety.exfiltration", &config.safety.exfiltration)?,
            replies: config.safety.replies,
        };

        let shortcuts = ShortcutRules {
            greeting_tokens: token_set(&config.shortcuts.greeting_tokens),
            greeting_phrases: phrase_set(
                "shortcuts.greeting_phrases",
                &config.shortcuts.greeting_phrases,
            )?,
            farewell_tokens: token_set(&config.shortcuts.farewell_tokens),
            farewell_phrases: phrase_set(
                "shortcuts.farewell_phrases",
                &config.shortcuts.farewell_phrases,
            )?,
            fallback_greeting: config.shortcuts.fallback_greeting,
            farewell_named: config.shortcuts.farewell_named,
            farewell_anonymous: config.shortcuts.farewell_anonymous,
        };

        let profile = ProfileRules {
            name_patterns: capture_patterns(
                "profile.name_patterns",
                &config.profile.name_patterns,
            )?,
            company_patterns: capture_patterns(
                "profile.company_patterns",
                &config.profile.company_patterns,
            )?,
            stopwords: token_set(&config.profile.stopwords),
            company_aliases: AliasTable::compile(
                "profile.company_aliases",
                &config.profile.company_aliases,
            )?,
            erp_vendors: AliasTable::compile("profile.erp_vendors", &config.profile.erp_vendors)?,
            acquirers: AliasTable::compile("profile.acquirers", &config.profile.acquirers)?,
        };

        let mut seen_topics = HashSet::new();
        let mut topics = Vec::with_capacity(config.topics.len());
        for topic in config.topics {
            if !seen_topics.insert(topic.id.clone()) {
                return Err(LexiconError::Validation(format!("duplicate topic id `{}`", topic.id)));
            }
            if topic.keywords.is_empty() {
                return Err(LexiconError::Validation(format!(
                    "topic `{}` must declare at least one keyword",
                    topic.id
                )));
            }
            topics.push(TopicRule {
                keywords: phrase_set("topics.keywords", &topic.keywords)?,
                cues: phrase_set("topics.cues", &topic.cues)?,
                canonical_question: normalize_input(&topic.canonical_question),
                suggestion: topic.suggestion,
                issue: topic.issue,
                id: topic.id,
            });
        }

        Ok(Self {
            terms: AliasTable::compile("normalizer.terms", &config.normalizer.terms)?,
            safety,
            shortcuts,
            profile,
            composer: ComposerTemplates {
                name_prefix: config.composer.name_prefix,
                company_clause: config.composer.company_clause,
                apology: config.composer.apology,
                default_suggestion: config.composer.default_suggestion,
                error_reply: config.composer.error_reply,
            },
            topics,
        })
    }

    /// First topic, in table order, whose keywords occur in `text`.
    pub fn detect_topic(&self, text: &str) -> Option<&TopicRule> {
        self.topics.iter().find(|topic| topic.keywords.is_match(text))
    }

    pub fn topic(&self, id: &str) -> Option<&TopicRule> {
        self.topics.iter().find(|topic| topic.id == id)
    }
}

fn phrase_set(table: &'static str, phrases: &[String]) -> Result<PhraseSet, LexiconError> {
    PhraseSet::new(phrases).map_err(|source| LexiconError::Phrase { table, source })
}

fn token_set(tokens: &[String]) -> HashSet<String> {
    tokens.iter().map(|token| normalize_input(token)).filter(|token| !token.is_empty()).collect()
}

fn capture_patterns(table: &'static str, patterns: &[String]) -> Result<Vec<Regex>, LexiconError> {
    patterns
        .iter()
        .map(|pattern| {
            let compiled = Regex::new(pattern).map_err(|source| LexiconError::Pattern {
                table,
                pattern: pattern.clone(),
                source,
            })?;
            if compiled.captures_len() < 2 {
                return Err(LexiconError::Validation(format!(
                    "pattern `{pattern}` in `{table}` needs a capture group"
                )));
            }
            Ok(compiled)
        })
        .collect()
}
