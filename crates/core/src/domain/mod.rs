pub mod chat;
pub mod conversation;
pub mod knowledge;
pub mod profile;
