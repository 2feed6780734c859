//! Persistence Adapters - JSONL History Files

pub mod history;

pub use history::JsonlHistory;
