//! # CareCard Core
//!
//! Core logic for the CareCard health companion.
//!
//! This crate holds the pieces shared by every front-end:
//! - A retrying HTTP helper with exponential backoff and caller cancellation
//! - A formatter for the Markdown subset returned by the completion service, rendering both
//!   HTML and structured plain text
//! - The completion client, analysis prompts, chat sessions and transcript export
//! - Nearby-hospital lookup, emergency links and the health profile behind the QR code
//!
//! **No API concerns**: HTTP servers and command-line handling belong in `api-rest` and `cli`.
//! Configuration is resolved once by the binaries and passed in as a [`CoreConfig`].

pub mod chat;
pub mod completion;
pub mod config;
pub mod constants;
pub mod emergency;
pub mod error;
pub mod hospitals;
pub mod markdown;
pub mod profile;
pub mod prompts;
pub mod retry;
pub mod transcript;

#[cfg(test)]
pub(crate) mod test_support;

pub use chat::{ChatMessage, ChatRole, ChatSession, MessageContent};
pub use completion::{CompletionClient, Content, InlineData, Part};
pub use config::{CompletionConfig, CoreConfig};
pub use error::{CareError, CareResult};
pub use hospitals::{GeoPoint, Hospital, HospitalFinder, Route};
pub use markdown::{format_response, response_plain_text, strip_tags, FormattedResponse, Node};
pub use profile::HealthProfile;
pub use prompts::AnalysisKind;
pub use retry::{
    HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, RetryPolicy, RetryingClient,
};
