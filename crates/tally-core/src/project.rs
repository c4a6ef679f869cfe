//! # Project Document
//!
//! The orchestrator: owns one document's state machine and wires decoding,
//! migration, field reads, derived fields and validity queries together.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Unopened ──open──► decode ──ok──► migrate? ──► read ──► derive        │
//! │       │                │                                    │           │
//! │       │                └──error──► Unparsable (terminal)    ▼           │
//! │       │                                                 Normalized      │
//! │       │                                                                 │
//! │   re-opening in ANY state but Unopened is a programmer error            │
//! │   (CoreError::AlreadyOpened), never a validation failure                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One document is opened, migrated, derived and validated as one
//! sequential batch. Each instance owns its document tree and ledger
//! exclusively; only the static rule/registry tables are shared.

use chrono::{NaiveDate, Utc};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::derive::DerivedFieldPipeline;
use crate::error::{CoreError, CoreResult};
use crate::ledger::{FieldTag, ValidationLedger};
use crate::migration::TransformationEngine;
use crate::path::{self, Document, FieldPath};
use crate::reader::FieldReader;
use crate::types::DocumentType;

// =============================================================================
// Document State
// =============================================================================

/// Lifecycle state of a [`ProjectDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    /// No document has been opened yet.
    Unopened,
    /// The raw input failed to decode. Terminal: no fields were ever read,
    /// so no document type can validate.
    Unparsable,
    /// Decoded, migrated if needed, fields read, derived fields computed.
    Normalized,
}

// =============================================================================
// Project Document
// =============================================================================

/// One project's document, ledger and state.
#[derive(Debug)]
pub struct ProjectDocument {
    settings: Settings,
    state: DocumentState,
    document: Document,
    ledger: ValidationLedger,
    name: Option<String>,
}

impl ProjectDocument {
    /// Creates an unopened instance.
    ///
    /// Fails fast on corrupted configuration (e.g. a tax rate above 100%)
    /// so that a broken setup never reaches document processing.
    pub fn new(settings: Settings) -> CoreResult<Self> {
        settings.tax_rate()?;
        Ok(ProjectDocument {
            settings,
            state: DocumentState::Unopened,
            document: Document::Null,
            ledger: ValidationLedger::new(),
            name: None,
        })
    }

    /// Decodes and normalizes a raw serialized document.
    ///
    /// Exactly one open is permitted per instance. A decode failure is data,
    /// not a programmer error: the state becomes [`DocumentState::Unparsable`]
    /// and `Ok` is returned; callers check the state before reading fields.
    pub fn open_str(&mut self, raw: &str) -> CoreResult<DocumentState> {
        self.open_str_at(raw, Utc::now().date_naive())
    }

    /// [`ProjectDocument::open_str`] with an explicit migration date.
    pub fn open_str_at(&mut self, raw: &str, today: NaiveDate) -> CoreResult<DocumentState> {
        if self.state != DocumentState::Unopened {
            return Err(CoreError::AlreadyOpened);
        }
        match serde_yaml::from_str(raw) {
            Ok(document) => self.normalize(document, today),
            Err(error) => {
                warn!(%error, "document failed to decode");
                self.state = DocumentState::Unparsable;
                Ok(self.state)
            }
        }
    }

    /// Normalizes an already-decoded document tree.
    pub fn open_value(&mut self, document: Document) -> CoreResult<DocumentState> {
        self.open_value_at(document, Utc::now().date_naive())
    }

    /// [`ProjectDocument::open_value`] with an explicit migration date.
    pub fn open_value_at(
        &mut self,
        document: Document,
        today: NaiveDate,
    ) -> CoreResult<DocumentState> {
        if self.state != DocumentState::Unopened {
            return Err(CoreError::AlreadyOpened);
        }
        self.normalize(document, today)
    }

    /// The single normalization pass: migrate when the declared format is
    /// below the baseline, then read every known field, then run the
    /// derived-field pipeline.
    fn normalize(&mut self, document: Document, today: NaiveDate) -> CoreResult<DocumentState> {
        let format = path::get_str(&document, "format")
            .unwrap_or(crate::DEFAULT_FORMAT_VERSION)
            .to_string();

        self.document = if format.as_str() < crate::BASELINE_FORMAT_VERSION {
            debug!(%format, "legacy format, migrating");
            let outcome = TransformationEngine::new(today).migrate(document)?;
            for failure in outcome.failures {
                self.ledger.record(failure.field, failure.reason);
            }
            outcome.document
        } else {
            document
        };

        FieldReader::new(&mut self.document, &self.settings, &mut self.ledger).read_all()?;
        DerivedFieldPipeline::new(&self.settings).run(&mut self.document)?;

        self.state = DocumentState::Normalized;
        Ok(self.state)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// The current lifecycle state.
    #[inline]
    pub fn state(&self) -> DocumentState {
        self.state
    }

    /// The normalized document tree (including derived fields).
    #[inline]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The validation ledger.
    #[inline]
    pub fn ledger(&self) -> &ValidationLedger {
        &self.ledger
    }

    /// The project name, if one was assigned.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Assigns the project name (normally the project folder name, owned by
    /// the out-of-scope plumbing).
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Reads a value by path from the normalized document.
    pub fn get(&self, raw_path: &str) -> Option<&serde_yaml::Value> {
        path::get(&self.document, &FieldPath::parse(raw_path))
    }

    // -------------------------------------------------------------------------
    // Validity
    // -------------------------------------------------------------------------

    /// True iff the document normalized and none of the type's required
    /// fields has a recorded failure.
    ///
    /// An unparsable document is invalid for every type.
    pub fn is_valid(&self, doc_type: DocumentType) -> bool {
        self.state == DocumentState::Normalized && self.ledger.is_valid(doc_type)
    }

    /// The required fields currently failing for the type, for diagnostics.
    ///
    /// Empty for an unparsable document: no fields were ever read, so there
    /// is nothing to itemize.
    pub fn failing_fields(&self, doc_type: DocumentType) -> Vec<FieldTag> {
        match self.state {
            DocumentState::Normalized => self.ledger.failing_fields(doc_type),
            _ => Vec::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Export Names
    // -------------------------------------------------------------------------

    /// The canonical output filename for a rendered document.
    ///
    /// Invoices carry number, name and event date; offers carry number and
    /// name. Returns `None` when the needed derived fields are absent.
    pub fn export_filename(&self, doc_type: DocumentType, ext: &str) -> Option<String> {
        let name = self.name.as_deref().unwrap_or("project");
        let ext = match ext {
            "" => String::new(),
            ext if ext.starts_with('.') => ext.to_string(),
            ext => format!(".{ext}"),
        };

        match doc_type {
            DocumentType::Invoice | DocumentType::Archive => {
                let number = path::get_str(&self.document, "invoice/number")?;
                let date = path::get_str(&self.document, "derived/event_date")?;
                Some(format!("{number} {name} {date}{ext}"))
            }
            DocumentType::Offer => {
                let number = path::get_str(&self.document, "derived/offer_number")?;
                Some(format!("{number} {name}{ext}"))
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const ALRIGHT: &str = "\
format: 2.4.0
created: 01.01.2013
client:
  title: Herr
  last_name: Doe
  email: john.doe@example.com
event:
  name: Summer Party
  dates:
    - begin: 17.07.2013
      end: 18.07.2013
manager: Manager Bob
offer:
  date: 16.07.2013
  appendix: 1
invoice:
  number: R027
  payed_date: 21.07.2013
archive: 2013
products:
  beer:
    price: \"10.00\"
    amount: 5
    sold: 3
hours:
  salary: \"8.00\"
  caterers:
    Name: 5
    Name2: 2.6
";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2014, 1, 15).unwrap()
    }

    fn open(raw: &str) -> ProjectDocument {
        let mut project = ProjectDocument::new(Settings::default()).unwrap();
        project.open_str_at(raw, today()).unwrap();
        project
    }

    #[test]
    fn test_alright_document_is_valid_for_every_type() {
        let project = open(ALRIGHT);
        assert_eq!(project.state(), DocumentState::Normalized);
        for doc_type in [DocumentType::Offer, DocumentType::Invoice, DocumentType::Archive] {
            assert!(project.is_valid(doc_type), "invalid for {doc_type:?}");
            assert!(project.failing_fields(doc_type).is_empty());
        }
    }

    #[test]
    fn test_reopening_is_a_programmer_error() {
        let mut project = ProjectDocument::new(Settings::default()).unwrap();
        project.open_str_at("manager: Bob\n", today()).unwrap();
        assert!(matches!(
            project.open_str_at("manager: Bob\n", today()),
            Err(CoreError::AlreadyOpened)
        ));
    }

    #[test]
    fn test_unparsable_document_is_invalid_with_no_itemized_fields() {
        let mut project = ProjectDocument::new(Settings::default()).unwrap();
        let state = project
            .open_str_at("client: [unclosed\n  nested: {", today())
            .unwrap();
        assert_eq!(state, DocumentState::Unparsable);

        for doc_type in [DocumentType::Offer, DocumentType::Invoice, DocumentType::Archive] {
            assert!(!project.is_valid(doc_type));
            assert!(project.failing_fields(doc_type).is_empty());
        }
    }

    #[test]
    fn test_broken_settings_fail_at_construction() {
        let settings = Settings {
            tax_rate_bps: 12000,
            ..Settings::default()
        };
        assert!(matches!(
            ProjectDocument::new(settings),
            Err(CoreError::TaxRateOutOfRange { .. })
        ));
    }

    #[test]
    fn test_legacy_document_end_to_end() {
        // Legacy flat schema: migrated, read, derived in one pass.
        let project = open(
            "format: 1.0.0\n\
             client: \"Title\\nSurname\"\n\
             email: john.doe@example.com\n\
             address: Street 1\n\
             signature: \"Line1\\nLine2\"\n\
             date: 17-18.07.2013\n\
             rnumber: R027\n\
             products:\n\
               beer:\n\
                 price: \"10.00\"\n\
                 amount: 5\n\
                 sold: 3\n",
        );

        let doc = project.document();
        assert_eq!(path::get_str(doc, "client/title"), Some("Title"));
        assert_eq!(path::get_str(doc, "client/last_name"), Some("Surname"));
        assert_eq!(path::get_str(doc, "manager"), Some("Line2"));
        assert_eq!(path::get_str(doc, "event/dates/0/begin"), Some("2013-07-17"));
        assert_eq!(path::get_str(doc, "event/dates/0/end"), Some("2013-07-18"));

        // Derived values flow from the migrated fields.
        assert_eq!(path::get_str(doc, "derived/invoice_costs"), Some("30.00"));
        assert_eq!(path::get_str(doc, "derived/invoice_taxes"), Some("5.70"));
        assert_eq!(path::get_str(doc, "derived/invoice_total"), Some("35.70"));
        assert_eq!(
            path::get_str(doc, "derived/invoice_longnumber"),
            Some("R2013-027")
        );

        // The migrated document declares the current schema.
        assert_eq!(path::get_str(doc, "format"), Some("2.4.0"));
        assert!(project.is_valid(DocumentType::Invoice));
    }

    #[test]
    fn test_current_format_is_never_migrated() {
        // A document at the baseline keeps its keys untouched; the legacy
        // rename sources would have moved if migration ran.
        let project = open("format: 2.4.0\nclient:\n  title: Herr\n  last_name: Doe\n");
        assert!(project.get("client/fullname").is_none());
        assert_eq!(
            project.get("client/title").and_then(|v| v.as_str()),
            Some("Herr")
        );
    }

    #[test]
    fn test_missing_required_fields_reported_per_type() {
        let project = open("format: 2.4.0\nmanager: Bob\n");
        assert!(!project.is_valid(DocumentType::Invoice));
        let failing = project.failing_fields(DocumentType::Invoice);
        assert!(failing.contains(&FieldTag::InvoiceNumber));
        assert!(failing.contains(&FieldTag::Products));
        assert!(!failing.contains(&FieldTag::Manager));
    }

    #[test]
    fn test_unrelated_errors_do_not_block_validity() {
        // Broken email never blocks invoice validity.
        let mut raw = ALRIGHT.replace("john.doe@example.com", "john.doe@@example.com");
        raw.push('\n');
        let project = open(&raw);
        assert!(project.ledger().has(FieldTag::Email));
        assert!(project.is_valid(DocumentType::Invoice));
    }

    #[test]
    fn test_export_filenames() {
        let mut project = ProjectDocument::new(Settings::default()).unwrap();
        project.set_name("summer_party");
        project.open_str_at(ALRIGHT, today()).unwrap();

        assert_eq!(
            project.export_filename(DocumentType::Invoice, "tex"),
            Some("R027 summer_party 2013-07-17.tex".to_string())
        );
        assert_eq!(
            project.export_filename(DocumentType::Offer, ".tex"),
            Some("A20130716-1 summer_party.tex".to_string())
        );
        assert_eq!(
            project.export_filename(DocumentType::Offer, ""),
            Some("A20130716-1 summer_party".to_string())
        );
    }

    #[test]
    fn test_normalization_is_single_shot_and_derived_stable() {
        // Running the pipeline again over the already-derived tree changes
        // nothing (pipeline idempotence at the orchestrator level).
        let project = open(ALRIGHT);
        let mut again = project.document().clone();
        DerivedFieldPipeline::new(&Settings::default())
            .run(&mut again)
            .unwrap();
        assert_eq!(&again, project.document());
    }
}
