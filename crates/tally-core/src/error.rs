//! # Error Types
//!
//! Fatal/programmer errors for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Classes                                   │
//! │                                                                         │
//! │  CoreError (this file)                                                  │
//! │  └── Fatal/programmer errors: broken caller or corrupted               │
//! │      configuration. Abort the operation immediately.                    │
//! │                                                                         │
//! │  FieldError (ledger module)                                             │
//! │  └── Data-validation failures: bad business data. Recorded in the      │
//! │      ValidationLedger, processing continues.                            │
//! │                                                                         │
//! │  The two classes are disjoint: a CoreError is NEVER placed in the      │
//! │  ledger, and a FieldError is NEVER returned as Err from the core.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (path, field name, value)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Fatal errors raised by the document core.
///
/// These indicate a broken caller or corrupted configuration, not bad
/// business data. They abort the current operation and are never recorded
/// in the `ValidationLedger`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A `ProjectDocument` was opened a second time.
    ///
    /// Exactly one open/normalize attempt is permitted per instance; a
    /// correction requires constructing a fresh instance.
    #[error("document was already opened")]
    AlreadyOpened,

    /// A structural write hit a node of the wrong shape.
    ///
    /// ## When This Occurs
    /// - `set("client/address", ..)` while `client` is a scalar
    /// - grafting two scalar leaves onto each other below the top level
    ///
    /// This is schema corruption, never silently overwritten.
    #[error("structural conflict at '{path}': expected a {expected} node")]
    StructuralConflict {
        path: String,
        expected: &'static str,
    },

    /// A tax rate outside the configured range of 0..=10000 basis points.
    ///
    /// A rate above 100% indicates misconfigured settings, not bad input
    /// data, so it is fatal rather than a validation failure.
    #[error("tax rate {bps} bps is outside 0..=10000")]
    TaxRateOutOfRange { bps: u32 },

    /// A derived-field name that is not in the static registry.
    #[error("unknown derived field '{0}'")]
    UnknownDerivedField(String),

    /// Two migration rules write into overlapping target paths.
    ///
    /// Rule application is only order-independent for disjoint targets, so
    /// an overlapping rule table is rejected outright.
    #[error("migration rules declare overlapping target '{0}'")]
    OverlappingRuleTargets(String),
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
