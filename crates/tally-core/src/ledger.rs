//! # Validation Ledger
//!
//! Accumulates field-level validation failures and answers per-document-type
//! validity queries.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  field read fails ──► FieldError appended (once per field+reason)       │
//! │                                                                         │
//! │  entries are NEVER removed; they are consulted only through the        │
//! │  validity predicate:                                                    │
//! │                                                                         │
//! │     is_valid(type) ⇔ required_fields(type) ∩ failed_fields = ∅          │
//! │                                                                         │
//! │  a pure set-intersection test - no retries, no re-reads                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::DocumentType;

// =============================================================================
// Field Tags
// =============================================================================

/// The closed set of validated field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTag {
    Format,
    Lang,
    Created,
    Client,
    /// The legacy multi-line client name block, flagged by migration when it
    /// cannot be split into title and surname.
    ClientFullname,
    Email,
    /// Event dates (begin/end parsing).
    Date,
    Manager,
    OfferNumber,
    InvoiceNumber,
    InvoicePayedDate,
    Archive,
    Products,
    Hours,
}

impl FieldTag {
    /// The snake_case name used in diagnostics.
    pub const fn name(&self) -> &'static str {
        match self {
            FieldTag::Format => "format",
            FieldTag::Lang => "lang",
            FieldTag::Created => "created",
            FieldTag::Client => "client",
            FieldTag::ClientFullname => "client_fullname",
            FieldTag::Email => "email",
            FieldTag::Date => "date",
            FieldTag::Manager => "manager",
            FieldTag::OfferNumber => "offer_number",
            FieldTag::InvoiceNumber => "invoice_number",
            FieldTag::InvoicePayedDate => "invoice_payed_date",
            FieldTag::Archive => "archive",
            FieldTag::Products => "products",
            FieldTag::Hours => "hours",
        }
    }
}

impl fmt::Display for FieldTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Field Errors
// =============================================================================

/// Why a field read failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorKind {
    /// The field (or a required part of it) is absent.
    Missing,
    /// The field is present but does not parse or match its grammar.
    Malformed,
    /// The field parses but its value is outside the allowed range.
    OutOfRange,
    /// The field contradicts another field (e.g. sold AND returned given).
    Inconsistent,
}

/// One recorded validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: FieldTag,
    pub reason: FieldErrorKind,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.field, self.reason)
    }
}

// =============================================================================
// Required-Field Sets
// =============================================================================

/// The static required-field set for a document type.
///
/// `archive` is a strict superset of `invoice`.
pub const fn required_fields(doc_type: DocumentType) -> &'static [FieldTag] {
    match doc_type {
        DocumentType::Offer => &[FieldTag::OfferNumber],
        DocumentType::Invoice => &[FieldTag::InvoiceNumber, FieldTag::Products, FieldTag::Manager],
        DocumentType::Archive => &[
            FieldTag::InvoiceNumber,
            FieldTag::Products,
            FieldTag::Manager,
            FieldTag::InvoicePayedDate,
            FieldTag::Archive,
        ],
    }
}

// =============================================================================
// Validation Ledger
// =============================================================================

/// Append-only collection of field validation failures.
///
/// Owned exclusively by one `ProjectDocument`; never shared across document
/// instances.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationLedger {
    errors: Vec<FieldError>,
}

impl ValidationLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        ValidationLedger::default()
    }

    /// Records a failure. Each (field, reason) pair is appended exactly
    /// once; repeating a record is a no-op.
    pub fn record(&mut self, field: FieldTag, reason: FieldErrorKind) {
        let entry = FieldError { field, reason };
        if !self.errors.contains(&entry) {
            self.errors.push(entry);
        }
    }

    /// Returns true if any failure was recorded for the field.
    pub fn has(&self, field: FieldTag) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// All recorded failures, in recording order.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Returns true if the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// The validity predicate: true iff no required field of the type has a
    /// recorded failure. Pure set intersection; never re-reads anything.
    pub fn is_valid(&self, doc_type: DocumentType) -> bool {
        required_fields(doc_type).iter().all(|tag| !self.has(*tag))
    }

    /// The required fields of the type that currently have failures, for
    /// diagnostics.
    pub fn failing_fields(&self, doc_type: DocumentType) -> Vec<FieldTag> {
        required_fields(doc_type)
            .iter()
            .copied()
            .filter(|tag| self.has(*tag))
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
