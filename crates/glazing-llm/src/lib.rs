//! Token sources for the Glazing chat server.
//!
//! A [`TokenSource`] turns a prompt into a stream of text fragments. Two
//! variants exist:
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  TokenSource                             │
//! │  - produce_fragments() -> FragmentStream │
//! └──────────────────────────────────────────┘
//!                 │
//!        ┌────────┴─────────┐
//!        ▼                  ▼
//! ┌─────────────┐    ┌──────────────┐
//! │  Fallback   │◀───│   Backend    │
//! │ (canned)    │    │ (OpenAI SSE) │
//! └─────────────┘    └──────────────┘
//! ```
//!
//! The backend variant degrades to the fallback generator on any failure,
//! so consumers never see an error from a fragment stream.

pub mod backend;
pub mod error;
pub mod fallback;
pub mod openai;
pub mod source;

pub use backend::BackendGenerator;
pub use error::{LlmError, RateLimitInfo, Result};
pub use fallback::{FALLBACK_RESPONSES, FallbackGenerator};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use source::{FragmentStream, TokenSource, TokenSourceConfig};
