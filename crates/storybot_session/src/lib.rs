//! Conversation layer for StoryBot.
//!
//! - [`SessionMachine`]: the book, character and chapter flows
//! - [`SessionStore`]: live sessions with idle eviction
//! - [`Dispatcher`]: one turn at a time per session, replies through a gateway
//! - [`check_completeness`]: keyword heuristic behind the clarification question

pub mod completeness;
mod dispatcher;
mod machine;
mod rules;
mod session;
mod store;

pub use completeness::{
    Aspect, Completeness, KeywordTable, check_completeness, clarification_question,
};
pub use dispatcher::Dispatcher;
pub use machine::{Effect, Reply, SessionMachine, Transition, tokens};
pub use rules::ValidationRules;
pub use session::{Session, SessionState};
pub use store::{SessionHandle, SessionStore};
