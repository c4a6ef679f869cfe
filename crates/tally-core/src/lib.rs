//! # tally-core: Pure Business Logic for Tally
//!
//! This crate is the **heart** of Tally. It ingests a semi-structured
//! project record (client, event, billable line items), migrates it across
//! schema versions, derives computed fields, validates it per document type
//! and exposes a ledger-accurate monetary model.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Tally Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   External collaborators (NOT in this crate)                    │   │
//! │  │   folder plumbing ──► raw document text ──► typeset renderer    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   decoded document                                              │   │
//! │  │        │                                                        │   │
//! │  │        ▼                                                        │   │
//! │  │   TransformationEngine  (legacy format < 2.4.0 only)            │   │
//! │  │        │                                                        │   │
//! │  │        ▼                                                        │   │
//! │  │   FieldReader ──► ValidationLedger                              │   │
//! │  │        │                                                        │   │
//! │  │        ▼                                                        │   │
//! │  │   DerivedFieldPipeline  (Money + LineItem arithmetic)           │   │
//! │  │        │                                                        │   │
//! │  │        ▼                                                        │   │
//! │  │   per-type validity queries                                     │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO RENDERING • SINGLE-THREADED • PURE FUNCTIONS      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`path`] - `/`-delimited addressing into the generic document tree
//! - [`money`] - exact fixed-point currency type with tax arithmetic
//! - [`line_item`] - quantity reconciliation and per-perspective cost math
//! - [`migration`] - declarative legacy-schema migration
//! - [`derive`] - ordered derived-field pipeline
//! - [`ledger`] - validation-error ledger and per-type validity
//! - [`project`] - the `ProjectDocument` orchestrator
//! - [`config`] - immutable settings passed into every constructor
//! - [`error`] - fatal/programmer error types
//!
//! ## Design Principles
//!
//! 1. **Two disjoint error classes**: fatal programmer errors abort; bad
//!    business data lands in the ledger and processing continues
//! 2. **Integer money**: exact minor units, one rounding rule
//!    (half-to-even) at rate-multiplication boundaries only
//! 3. **No shared mutable state**: one document instance owns its tree and
//!    ledger; only static rule/registry tables are shared
//! 4. **Append-only documents**: after normalization, keys are added but
//!    never silently overwritten
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::{DocumentType, ProjectDocument, Settings};
//!
//! let mut project = ProjectDocument::new(Settings::default()).unwrap();
//! project.open_str(
//!     "format: 2.4.0\n\
//!      manager: Manager Bob\n\
//!      invoice:\n  number: R027\n\
//!      products:\n  beer:\n    price: \"10.00\"\n    amount: 5\n",
//! ).unwrap();
//!
//! assert!(project.is_valid(DocumentType::Invoice));
//! assert_eq!(
//!     project.get("derived/invoice_total").and_then(|v| v.as_str()),
//!     Some("59.50"),
//! );
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod derive;
pub mod error;
pub mod ledger;
pub mod line_item;
pub mod migration;
pub mod money;
pub mod path;
pub mod project;
mod reader;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tally_core::Money` instead of
// `use tally_core::money::Money`

pub use config::{Addressing, Currency, Settings};
pub use derive::{DerivedField, DerivedFieldPipeline};
pub use error::{CoreError, CoreResult};
pub use ledger::{FieldError, FieldErrorKind, FieldTag, ValidationLedger};
pub use line_item::{ItemSums, LineItem, Perspective};
pub use migration::{MigrationOutcome, TransformationEngine};
pub use money::{Money, TaxRate};
pub use path::{Document, FieldPath};
pub use project::{DocumentState, ProjectDocument};
pub use types::{DateRange, DocumentType};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Schema version assumed when a document declares none.
pub const DEFAULT_FORMAT_VERSION: &str = "1.0.0";

/// Current schema baseline. Documents declaring a lower version (compared
/// lexicographically) are migrated before anything reads them.
pub const BASELINE_FORMAT_VERSION: &str = "2.4.0";
