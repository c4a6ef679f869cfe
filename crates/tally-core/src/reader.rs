//! # Field Readers
//!
//! Per-field read entry points over the normalized document.
//!
//! ## Read Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  A "read" of a known field is the SINGLE entry point that both:         │
//! │                                                                         │
//! │  (a) extracts/normalizes the field's value into the working document    │
//! │      (dates rewritten in ISO form, quantities reconciled, defaults      │
//! │      filled in)                                                         │
//! │                                                                         │
//! │  (b) performs its validation, appending a FieldError to the ledger on   │
//! │      failure                                                            │
//! │                                                                         │
//! │  A failed read NEVER aborts: the field is skipped or defaulted and     │
//! │  the remaining document is still processed. Only structural writes     │
//! │  (schema corruption) are fatal.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde_yaml::Value;
use tracing::debug;

use crate::config::Settings;
use crate::error::CoreResult;
use crate::ledger::{FieldErrorKind, FieldTag, ValidationLedger};
use crate::line_item::LineItem;
use crate::money::{money_from_yaml, scaled_from_yaml};
use crate::path::{self, Document, FieldPath};
use crate::types::{iso, parse_date};

// =============================================================================
// Field Reader
// =============================================================================

/// Reads, normalizes and validates every known field of a document.
pub(crate) struct FieldReader<'a> {
    doc: &'a mut Document,
    settings: &'a Settings,
    ledger: &'a mut ValidationLedger,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(
        doc: &'a mut Document,
        settings: &'a Settings,
        ledger: &'a mut ValidationLedger,
    ) -> Self {
        FieldReader {
            doc,
            settings,
            ledger,
        }
    }

    /// Reads every known field in order.
    pub(crate) fn read_all(&mut self) -> CoreResult<()> {
        self.read_format()?;
        self.read_lang()?;
        self.read_created()?;
        self.read_client()?;
        self.read_event()?;
        self.read_manager()?;
        self.read_offer()?;
        self.read_invoice()?;
        self.read_products()?;
        self.read_hours();
        self.read_archive();
        debug!(errors = self.ledger.errors().len(), "field reads complete");
        Ok(())
    }

    fn record(&mut self, field: FieldTag, reason: FieldErrorKind) {
        self.ledger.record(field, reason);
    }

    // -------------------------------------------------------------------------
    // Scalars
    // -------------------------------------------------------------------------

    fn read_format(&mut self) -> CoreResult<()> {
        match path::get(self.doc, &FieldPath::parse("format")) {
            None => path::set(
                self.doc,
                &FieldPath::parse("format"),
                Value::String(crate::DEFAULT_FORMAT_VERSION.to_string()),
            ),
            Some(Value::String(_)) => Ok(()),
            Some(_) => {
                self.record(FieldTag::Format, FieldErrorKind::Malformed);
                Ok(())
            }
        }
    }

    fn read_lang(&mut self) -> CoreResult<()> {
        if !path::has(self.doc, &FieldPath::parse("lang")) {
            let lang = self.settings.lang.clone();
            path::set(self.doc, &FieldPath::parse("lang"), Value::String(lang))?;
        }
        Ok(())
    }

    fn read_created(&mut self) -> CoreResult<()> {
        self.read_date_at("created", FieldTag::Created, true)
    }

    /// Reads a single date scalar, rewriting it in ISO form.
    fn read_date_at(&mut self, at: &str, tag: FieldTag, required: bool) -> CoreResult<()> {
        let field = FieldPath::parse(at);
        match path::get(self.doc, &field) {
            None => {
                if required {
                    self.record(tag, FieldErrorKind::Missing);
                }
                Ok(())
            }
            Some(value) => match value.as_str().and_then(parse_date) {
                Some(date) => path::set(self.doc, &field, Value::String(iso(date))),
                None => {
                    self.record(tag, FieldErrorKind::Malformed);
                    Ok(())
                }
            },
        }
    }

    // -------------------------------------------------------------------------
    // Client
    // -------------------------------------------------------------------------

    fn read_client(&mut self) -> CoreResult<()> {
        if !path::has(self.doc, &FieldPath::parse("client")) {
            self.record(FieldTag::Client, FieldErrorKind::Missing);
            self.record(FieldTag::Email, FieldErrorKind::Missing);
            return Ok(());
        }

        for part in ["client/title", "client/last_name"] {
            match path::get_str(self.doc, part) {
                Some(s) if !s.trim().is_empty() => {}
                _ => self.record(FieldTag::Client, FieldErrorKind::Missing),
            }
        }

        match path::get_str(self.doc, "client/email") {
            None => self.record(FieldTag::Email, FieldErrorKind::Missing),
            Some(email) => {
                if !is_valid_email(email) {
                    self.record(FieldTag::Email, FieldErrorKind::Malformed);
                }
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Event Dates
    // -------------------------------------------------------------------------

    fn read_event(&mut self) -> CoreResult<()> {
        let count = match path::get(self.doc, &FieldPath::parse("event/dates")) {
            Some(Value::Sequence(dates)) if !dates.is_empty() => dates.len(),
            _ => {
                self.record(FieldTag::Date, FieldErrorKind::Missing);
                return Ok(());
            }
        };

        for i in 0..count {
            self.read_event_entry(i)?;
        }
        Ok(())
    }

    /// One `event/dates` entry: `begin` must parse; a missing `end`
    /// defaults to `begin` (zero-length range); `end` before `begin` is
    /// out of range.
    fn read_event_entry(&mut self, index: usize) -> CoreResult<()> {
        let begin_path = FieldPath::parse(&format!("event/dates/{index}/begin"));
        let end_path = FieldPath::parse(&format!("event/dates/{index}/end"));

        let begin = match path::get(self.doc, &begin_path) {
            None => {
                self.record(FieldTag::Date, FieldErrorKind::Missing);
                return Ok(());
            }
            Some(value) => match value.as_str().and_then(parse_date) {
                None => {
                    self.record(FieldTag::Date, FieldErrorKind::Malformed);
                    return Ok(());
                }
                Some(begin) => begin,
            },
        };
        path::set(self.doc, &begin_path, Value::String(iso(begin)))?;

        let end = match path::get(self.doc, &end_path) {
            None => begin,
            Some(value) => match value.as_str().and_then(parse_date) {
                None => {
                    self.record(FieldTag::Date, FieldErrorKind::Malformed);
                    return Ok(());
                }
                Some(end) => end,
            },
        };
        if end < begin {
            self.record(FieldTag::Date, FieldErrorKind::OutOfRange);
            return Ok(());
        }
        path::set(self.doc, &end_path, Value::String(iso(end)))
    }

    // -------------------------------------------------------------------------
    // Manager
    // -------------------------------------------------------------------------

    fn read_manager(&mut self) -> CoreResult<()> {
        match path::get_str(self.doc, "manager") {
            Some(name) if !name.trim().is_empty() => {
                let trimmed = name.trim().to_string();
                path::set(
                    self.doc,
                    &FieldPath::parse("manager"),
                    Value::String(trimmed),
                )
            }
            _ => {
                self.record(FieldTag::Manager, FieldErrorKind::Missing);
                Ok(())
            }
        }
    }

    // -------------------------------------------------------------------------
    // Offer / Invoice Numbers
    // -------------------------------------------------------------------------

    fn read_offer(&mut self) -> CoreResult<()> {
        // The offer number is generated from offer/date and offer/appendix,
        // so those are what a read validates.
        self.read_date_at("offer/date", FieldTag::OfferNumber, true)?;

        if let Some(appendix) = path::get(self.doc, &FieldPath::parse("offer/appendix")) {
            match appendix.as_i64() {
                Some(n) if n >= 1 => {}
                Some(_) => self.record(FieldTag::OfferNumber, FieldErrorKind::OutOfRange),
                None => self.record(FieldTag::OfferNumber, FieldErrorKind::Malformed),
            }
        }
        Ok(())
    }

    fn read_invoice(&mut self) -> CoreResult<()> {
        match path::get_str(self.doc, "invoice/number") {
            None => self.record(FieldTag::InvoiceNumber, FieldErrorKind::Missing),
            Some(number) => {
                if !is_invoice_number(number) {
                    self.record(FieldTag::InvoiceNumber, FieldErrorKind::Malformed);
                }
            }
        }
        self.read_date_at("invoice/payed_date", FieldTag::InvoicePayedDate, true)
    }

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    fn read_products(&mut self) -> CoreResult<()> {
        let tax_rate = self.settings.tax_rate()?;

        let doc = &mut *self.doc;
        let ledger = &mut *self.ledger;

        let Some(products) = doc.get_mut("products").and_then(Value::as_mapping_mut) else {
            ledger.record(FieldTag::Products, FieldErrorKind::Missing);
            return Ok(());
        };
        if products.is_empty() {
            ledger.record(FieldTag::Products, FieldErrorKind::Missing);
            return Ok(());
        }

        for (name, item) in products.iter_mut() {
            let name = name.as_str().unwrap_or_default().to_string();
            let Some(item) = item.as_mapping_mut() else {
                ledger.record(FieldTag::Products, FieldErrorKind::Malformed);
                continue;
            };

            let price = match item.get("price") {
                None => {
                    ledger.record(FieldTag::Products, FieldErrorKind::Missing);
                    continue;
                }
                Some(raw) => match money_from_yaml(raw) {
                    Ok(price) => price,
                    Err(_) => {
                        ledger.record(FieldTag::Products, FieldErrorKind::Malformed);
                        continue;
                    }
                },
            };
            let amount = match item.get("amount").map(Value::as_i64) {
                None => {
                    ledger.record(FieldTag::Products, FieldErrorKind::Missing);
                    continue;
                }
                Some(None) => {
                    ledger.record(FieldTag::Products, FieldErrorKind::Malformed);
                    continue;
                }
                Some(Some(amount)) => amount,
            };
            let sold = item.get("sold").and_then(Value::as_i64);
            let returned = item.get("returned").and_then(Value::as_i64);

            // An explicitly given pair must reconcile against the quoted
            // quantity; a contradictory pair is never silently resolved.
            let (sold, returned) = match (sold, returned) {
                (Some(s), Some(r)) if s + r == amount => (Some(s), None),
                (Some(_), Some(_)) => {
                    ledger.record(FieldTag::Products, FieldErrorKind::Inconsistent);
                    continue;
                }
                other => other,
            };

            match LineItem::reconcile(name, price, amount, sold, returned, tax_rate) {
                Ok(line) => {
                    // Normalize: the inferred quantities are written back so
                    // later consumers see the reconciled pair.
                    item.insert(
                        Value::String("sold".into()),
                        Value::from(line.quantity(crate::line_item::Perspective::Invoiced)),
                    );
                    item.insert(Value::String("returned".into()), Value::from(line.returned()));
                }
                Err(_) => {
                    ledger.record(FieldTag::Products, FieldErrorKind::OutOfRange);
                }
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Hours
    // -------------------------------------------------------------------------

    fn read_hours(&mut self) {
        if !path::has(self.doc, &FieldPath::parse("hours")) {
            return;
        }

        match path::get(self.doc, &FieldPath::parse("hours/salary")) {
            None => self.record(FieldTag::Hours, FieldErrorKind::Missing),
            Some(raw) => {
                if money_from_yaml(raw).is_err() {
                    self.record(FieldTag::Hours, FieldErrorKind::Malformed);
                }
            }
        }

        if let Some(Value::Mapping(caterers)) =
            path::get(self.doc, &FieldPath::parse("hours/caterers"))
        {
            let malformed = caterers
                .iter()
                .any(|(_, hours)| scaled_from_yaml(hours, 2).is_err());
            if malformed {
                self.record(FieldTag::Hours, FieldErrorKind::Malformed);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Archive
    // -------------------------------------------------------------------------

    /// The archive year is stamped by the (out-of-scope) folder plumbing
    /// when a project is archived; only the `archive` document type
    /// requires it.
    fn read_archive(&mut self) {
        match path::get(self.doc, &FieldPath::parse("archive")) {
            None => self.record(FieldTag::Archive, FieldErrorKind::Missing),
            Some(year) => {
                if year.as_i64().is_none() {
                    self.record(FieldTag::Archive, FieldErrorKind::Malformed);
                }
            }
        }
    }
}

// =============================================================================
// Grammars
// =============================================================================

/// Conservative syntactic email check: exactly one `@`, non-empty local and
/// domain parts, a restricted character set and no dot abuse.
///
/// Deliberately NOT full RFC 5322; it only has to reject obvious typos
/// without false-negatives on real addresses.
pub(crate) fn is_valid_email(raw: &str) -> bool {
    let mut parts = raw.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };

    let local_ok = !local.is_empty()
        && !local.starts_with('.')
        && !local.ends_with('.')
        && !local.contains("..")
        && local.chars().all(|c| {
            c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-".contains(c)
        });

    let domain_ok = !domain.is_empty()
        && !domain.starts_with(['.', '-'])
        && !domain.ends_with(['.', '-'])
        && !domain.contains("..")
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');

    local_ok && domain_ok
}

/// Short-form identifier grammar: one uppercase letter followed by digits
/// ("R027"). The long form embeds the creation year and is derived, never
/// read.
pub(crate) fn is_invoice_number(raw: &str) -> bool {
    let mut chars = raw.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.as_str().len() > 0
        && chars.all(|c| c.is_ascii_digit())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentType;

    fn read(yaml: &str) -> (Document, ValidationLedger) {
        let mut doc: Document = serde_yaml::from_str(yaml).unwrap();
        let settings = Settings::default();
        let mut ledger = ValidationLedger::new();
        FieldReader::new(&mut doc, &settings, &mut ledger)
            .read_all()
            .unwrap();
        (doc, ledger)
    }

    const ALRIGHT: &str = "\
format: 2.4.0
created: 01.01.2013
client:
  title: Herr
  last_name: Doe
  email: john.doe@example.com
event:
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

    #[test]
    fn test_alright_document_has_no_errors() {
        let (_, ledger) = read(ALRIGHT);
        assert!(ledger.is_empty(), "unexpected errors: {:?}", ledger.errors());
        assert!(ledger.is_valid(DocumentType::Invoice));
        assert!(ledger.is_valid(DocumentType::Offer));
        assert!(ledger.is_valid(DocumentType::Archive));
    }

    #[test]
    fn test_email_grammar() {
        assert!(is_valid_email("john.doe@example.com"));
        assert!(is_valid_email("john.doe@com"));
        assert!(!is_valid_email("john.doe@@example.com"));
        assert!(!is_valid_email("john.doeexample.com"));
        assert!(!is_valid_email(".@.com"));
        assert!(!is_valid_email("a b@example.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_bad_email_is_recorded_malformed() {
        let (_, ledger) = read("client:\n  title: Herr\n  last_name: Doe\n  email: john.doe@@example.com\n");
        assert!(ledger
            .errors()
            .iter()
            .any(|e| e.field == FieldTag::Email && e.reason == FieldErrorKind::Malformed));
    }

    #[test]
    fn test_invoice_number_grammar() {
        assert!(is_invoice_number("R027"));
        assert!(is_invoice_number("R1"));
        assert!(!is_invoice_number("r027"));
        assert!(!is_invoice_number("R"));
        assert!(!is_invoice_number("R02a"));
        assert!(!is_invoice_number("027"));
    }

    #[test]
    fn test_dates_are_normalized_to_iso() {
        let (doc, ledger) = read(ALRIGHT);
        assert_eq!(path::get_str(&doc, "event/dates/0/begin"), Some("2013-07-17"));
        assert_eq!(path::get_str(&doc, "event/dates/0/end"), Some("2013-07-18"));
        assert_eq!(path::get_str(&doc, "created"), Some("2013-01-01"));
        assert_eq!(path::get_str(&doc, "invoice/payed_date"), Some("2013-07-21"));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_missing_end_defaults_to_begin() {
        let (doc, ledger) = read("event:\n  dates:\n    - begin: 04.07.2014\n");
        assert_eq!(path::get_str(&doc, "event/dates/0/begin"), Some("2014-07-04"));
        assert_eq!(path::get_str(&doc, "event/dates/0/end"), Some("2014-07-04"));
        assert!(!ledger.has(FieldTag::Date));
    }

    #[test]
    fn test_broken_and_missing_dates() {
        let (_, ledger) = read("event:\n  dates:\n    - begin: not a date\n");
        assert!(ledger.has(FieldTag::Date));

        let (_, ledger) = read("event:\n  name: No dates\n");
        assert!(ledger.has(FieldTag::Date));

        let (_, ledger) = read("event:\n  dates:\n    - begin: 05.07.2014\n      end: 04.07.2014\n");
        assert!(ledger
            .errors()
            .iter()
            .any(|e| e.field == FieldTag::Date && e.reason == FieldErrorKind::OutOfRange));
    }

    #[test]
    fn test_missing_manager_and_products_invalidate_invoice() {
        let (_, ledger) = read("format: 2.4.0\n");
        assert!(ledger.has(FieldTag::Manager));
        assert!(ledger.has(FieldTag::Products));
        assert!(ledger.has(FieldTag::InvoiceNumber));
        assert!(!ledger.is_valid(DocumentType::Invoice));
    }

    #[test]
    fn test_product_quantities_are_reconciled_and_written_back() {
        let (doc, ledger) = read(
            "products:\n  beer:\n    price: \"10.00\"\n    amount: 5\n    sold: 3\n",
        );
        assert!(!ledger.has(FieldTag::Products));
        let returned = path::get(&doc, &FieldPath::parse("products/beer/returned"));
        assert_eq!(returned.and_then(Value::as_i64), Some(2));
    }

    #[test]
    fn test_contradictory_sold_and_returned_is_inconsistent() {
        // 3 + 3 != 5: the pair does not reconcile.
        let (_, ledger) = read(
            "products:\n  beer:\n    price: \"10.00\"\n    amount: 5\n    sold: 3\n    returned: 3\n",
        );
        assert!(ledger
            .errors()
            .iter()
            .any(|e| e.field == FieldTag::Products && e.reason == FieldErrorKind::Inconsistent));
    }

    #[test]
    fn test_reconciling_sold_and_returned_pair_is_accepted() {
        let (_, ledger) = read(
            "products:\n  beer:\n    price: \"10.00\"\n    amount: 5\n    sold: 3\n    returned: 2\n",
        );
        assert!(!ledger.has(FieldTag::Products));
    }

    #[test]
    fn test_product_missing_price_or_amount() {
        let (_, ledger) = read("products:\n  beer:\n    amount: 5\n");
        assert!(ledger
            .errors()
            .iter()
            .any(|e| e.field == FieldTag::Products && e.reason == FieldErrorKind::Missing));

        let (_, ledger) = read("products: {}\n");
        assert!(ledger.has(FieldTag::Products));
    }

    #[test]
    fn test_hours_require_salary() {
        let (_, ledger) = read("hours:\n  caterers:\n    Name: 5\n");
        assert!(ledger.has(FieldTag::Hours));

        let (_, ledger) = read("hours:\n  salary: \"8.00\"\n");
        assert!(!ledger.has(FieldTag::Hours));

        // Absent hours block is fine: the field is optional.
        let (_, ledger) = read("manager: Bob\n");
        assert!(!ledger.has(FieldTag::Hours));
    }

    #[test]
    fn test_defaults_are_filled_in() {
        let (doc, _) = read("manager: Bob\n");
        assert_eq!(path::get_str(&doc, "format"), Some("1.0.0"));
        assert_eq!(path::get_str(&doc, "lang"), Some("de"));
    }
}
