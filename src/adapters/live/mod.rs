//! Live adapters for real external interactions.

pub mod artifacts;
pub mod audit;
pub mod fetcher;
pub mod filesystem;
pub mod keyword_index;
pub mod llm;
pub mod notifier;
pub mod system;
pub mod warehouse;
