// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod ai;
pub mod config;
pub mod curate;
pub mod digest;
pub mod history;
pub mod ingest;
pub mod notify;
pub mod pipeline;
pub mod rollup;
pub mod scheduler;

// ---- Re-exports for stable public API ----
pub use crate::ai::{ChatCapability, ChatRequest, MockCapability, OpenAiClient, SharedCapability};
pub use crate::config::AppConfig;
pub use crate::curate::Topic;
pub use crate::digest::{BriefKind, DigestComposer};
pub use crate::history::{HistoryRecord, HistoryStore};
pub use crate::ingest::types::NewsItem;
pub use crate::pipeline::Pipeline;
