pub mod api;
pub mod commands;
pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod knowledge_base;
pub mod llm;
pub mod providers;

// Re-export commonly used items
pub use error::{RagError, Result};
pub use knowledge_base::{Answer, KnowledgeBase};
