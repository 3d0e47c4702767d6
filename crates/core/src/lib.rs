pub mod config;
pub mod domain;
pub mod errors;
pub mod lexicon;
pub mod relevance;
pub mod store;
pub mod text;

pub use domain::chat::{ChatResult, Intent};
pub use domain::conversation::{ConversationId, ConversationTurn, Role, UserId};
pub use domain::knowledge::{KnowledgeEntry, PendingQuestion, PendingStatus};
pub use domain::profile::{ProfilePatch, UserProfile};
pub use errors::{ApplicationError, InterfaceError, StoreError};
pub use lexicon::{Lexicon, LexiconError};
pub use store::{ConversationLog, KnowledgeStore, PendingStore, ProfileStore};
