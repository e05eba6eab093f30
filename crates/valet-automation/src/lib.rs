//! Automation layer for Valet.
//!
//! This crate turns an automation type plus a parameter payload into a call
//! against the right executor and a row in the automation ledger:
//!
//! - [`kind::AutomationType`] — the closed allow-list of automation types
//!   and their required parameters.
//! - [`traits::Executor`] — the uniform executor interface.  Executors never
//!   error for "the target misbehaved"; such cases come back as a failed
//!   [`traits::ExecutionOutcome`].
//! - [`dispatcher::Dispatcher`] — validation, wall-clock timing, and the
//!   always-write-a-record rule.
//! - Default executors: HTTP fetch scraping ([`fetch`]), the outbound
//!   workflow-webhook relay ([`relay`]), LinkedIn lookups ([`linkedin`]),
//!   and mail-provider actions gated on OAuth state ([`mail`]).

pub mod dispatcher;
pub mod error;
pub mod fetch;
pub mod kind;
pub mod linkedin;
pub mod mail;
pub mod relay;
pub mod traits;

pub use dispatcher::Dispatcher;
pub use error::{AutomationError, Result};
pub use fetch::FetchExecutor;
pub use kind::AutomationType;
pub use linkedin::LinkedinExecutor;
pub use mail::MailExecutor;
pub use relay::RelayExecutor;
pub use traits::{ExecutionOutcome, Executor};
