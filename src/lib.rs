#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::items_after_statements,
    clippy::manual_let_else,
    clippy::map_unwrap_or,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::redundant_closure_for_method_calls,
    clippy::single_match_else,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unnecessary_wraps
)]

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod gateway;
pub mod health;
pub mod provider;
pub mod query;
pub mod store;
pub(crate) mod util;

pub use config::Config;
pub use connection::{ConnectionMonitor, ConnectionState};
pub use dispatch::{DispatchError, Dispatcher};
pub use provider::{Provider, ProviderEvent};
pub use query::{QueryError, QueryService};
pub use store::{MessageRecord, MessageStore};
