//! Automation layer error types.
//!
//! Only *structural* failures are errors here: a type outside the
//! allow-list, or a malformed request.  Failures that happen while a valid
//! request executes are absorbed into the
//! [`crate::traits::ExecutionOutcome`] and land in the ledger as data.

/// Unified error type for the automation layer.
#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    /// The automation type is not in the allow-list.
    ///
    /// Deliberately closed-world: removing a type from the list makes every
    /// request for it fail loudly, never silently degrade.
    #[error("unsupported automation type: {automation_type}")]
    UnsupportedType { automation_type: String },

    /// A required parameter for the type is absent or blank.
    #[error("missing required parameter `{parameter}` for {automation_type}")]
    MissingParameter {
        automation_type: String,
        parameter: &'static str,
    },

    /// Writing the ledger record failed.
    #[error("store error: {0}")]
    Store(#[from] valet_store::StoreError),
}

/// Convenience alias used throughout the automation crate.
pub type Result<T> = std::result::Result<T, AutomationError>;
