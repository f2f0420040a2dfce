//! Mail collaborator: the [`MailSource`] contract the engine reads from and
//! its Microsoft Graph implementation.

pub mod error;
pub mod graph;
pub mod message;
pub mod source;
pub mod token;

pub use error::MailError;
pub use graph::GraphMailSource;
pub use message::{EarliestMessage, RawMessage};
pub use source::{MailSource, MessagePage};
pub use token::{token_provider_from_config, RefreshingToken, StaticToken, TokenProvider};
