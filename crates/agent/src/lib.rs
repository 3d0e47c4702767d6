//! Dialogue pipeline - turns one raw utterance into one chat result
//!
//! This crate is the decision core of Ednna:
//! - Rewrites short follow-ups using the topic of the previous user turn
//! - Filters offensive, off-topic and data-extraction requests
//! - Answers greetings and farewells without touching the knowledge base
//! - Learns profile attributes (name, company, ERP, acquirer) as they appear
//! - Matches the question against the knowledge base in two tiers
//! - Records unanswered questions for the teaching workflow
//!
//! # Architecture
//!
//! Each turn runs an ordered list of stages (`pipeline`). A stage either lets
//! the turn continue or handles it with a final result:
//! 1. **Context** (`context`) - short follow-up → canonical question
//! 2. **Safety** (`safety`) - may short-circuit with `filtered`
//! 3. **Greeting / Farewell** (`shortcuts`) - may short-circuit
//! 4. **Profile** (`profile`) - side effect only
//! 5. **Normalize** (`normalizer`) - misspellings → canonical terms
//! 6. **Knowledge** (`matcher`, `recorder`) - exact, then fuzzy lookup
//! 7. **Compose** (`composer`) - personalized reply text
//!
//! # Key Types
//!
//! - `DialogueOrchestrator` - builds the stage list and runs `process_turn`
//! - `Stage` - one step of the pipeline over a mutable `TurnContext`
//!
//! Every decision is a literal or pattern match over the lexicon tables. A
//! store failure never escapes `process_turn`; it becomes the `error` result.

pub mod composer;
pub mod context;
pub mod matcher;
pub mod normalizer;
pub mod pipeline;
pub mod profile;
pub mod recorder;
pub mod runtime;
pub mod safety;
pub mod shortcuts;

pub use runtime::{Collaborators, DialogueOrchestrator};
