//! pw-chat: reliable prompt/reply automation for browser-hosted chat interfaces.
//!
//! Chat front-ends expose no programmatic API, so the rendered page is the only
//! integration point. This crate layers three things on top of a
//! [`PageDriver`]:
//!
//! - a retry executor with exponential backoff for flaky UI steps ([`retry`]),
//! - a login detection and recovery state machine ([`SessionAuthenticator`]),
//! - a two-phase completion detector for streamed replies ([`ResponseWaiter`]).
//!
//! The [`Orchestrator`] strings them together for a single run.
//!
//! # Example
//!
//! ```ignore
//! use pw_chat::{ChatConfig, Orchestrator};
//!
//! let orchestrator = Orchestrator::new(ChatConfig::default(), factory);
//! let reply = orchestrator.run("Hello", Some("Proposals")).await?;
//! println!("{}", reply.text);
//! ```

pub mod auth;
pub mod config;
pub mod conversation;
pub mod driver;
pub mod error;
pub mod locator;
pub mod orchestrator;
pub mod prompt;
pub mod response;
pub mod retry;
pub mod session;
pub mod testing;

pub use auth::{AuthState, SessionAuthenticator};
pub use config::{ChatConfig, Credentials, DEFAULT_LOGIN_URL, DEFAULT_TARGET_URL, Timeouts};
pub use conversation::{ConversationOutcome, ConversationSelector};
pub use driver::{ElementRef, PageDriver, WaitUntil};
pub use error::{ChatError, ErrorKind, Result};
pub use locator::{Locator, LocatorKey, LocatorTable, Selector};
pub use orchestrator::Orchestrator;
pub use prompt::PromptSubmitter;
pub use response::{Completion, ResponseExtractor, ResponseResult, ResponseWaiter};
pub use retry::{RetryPolicy, retry};
pub use session::{BrowserSession, SessionFactory};
