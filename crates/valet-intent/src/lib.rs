//! Intent layer for Valet.
//!
//! This crate provides:
//!
//! - **Intent types**: the classifier output shape ([`IntentResult`]) and
//!   slot payloads consumed by the workflow engine.
//! - **Policy registry**: the static intent → policy table
//!   ([`policy::PolicyRegistry`]) that decides whether an intent is answered
//!   conversationally, held for human approval, or executed directly.
//! - **Classifier**: the [`classifier::Classifier`] trait plus the default
//!   two-tier implementation (fast local phrase/pattern matching with an
//!   LLM fallback) via [`classifier::TieredClassifier`].

pub mod classifier;
pub mod error;
pub mod policy;
pub mod types;

pub use classifier::{Classifier, ClassifierConfig, SessionContext, TieredClassifier};
pub use error::{IntentError, Result};
pub use policy::{IntentPolicy, IntentPolicyEntry, PolicyRegistry};
pub use types::{IntentResult, SlotMap};
