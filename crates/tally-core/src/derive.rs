//! # Derived Fields
//!
//! A fixed, ordered pipeline of generators computing derived values from
//! the normalized document.
//!
//! ## Pipeline Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Derived Field Pipeline                              │
//! │                                                                         │
//! │  normalized document                                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  [ client_addressing, event_date, event_prettydate, caterers,           │
//! │    hours_time, hours_total, offer_number, offer_costs, offer_taxes,     │
//! │    offer_total, invoice_costs, invoice_taxes, invoice_total,            │
//! │    invoice_longnumber ]            ← fixed order, closed enum           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  each result written under "derived/<name>"                             │
//! │                                                                         │
//! │  ORDER MATTERS: later generators read earlier derived fields            │
//! │    offer_total        ← derived/offer_costs + derived/offer_taxes       │
//! │    hours_total        ← derived/hours_time × hours/salary               │
//! │    invoice_longnumber ← year of derived/event_date                      │
//! │                                                                         │
//! │  Every generator is IDEMPOTENT: running the pipeline twice over an     │
//! │  already-derived document changes nothing.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The registry is static: an unknown name is a fatal configuration error,
//! never an open-ended dispatch.

use chrono::Datelike;
use serde_yaml::Value;
use tracing::debug;

use crate::config::Settings;
use crate::error::{CoreError, CoreResult};
use crate::line_item::{ItemSums, LineItem, Perspective};
use crate::money::{div_round_half_even, money_from_yaml, scaled_from_yaml, Money};
use crate::path::{self, Document, FieldPath};
use crate::reader::is_invoice_number;
use crate::types::parse_date;

/// Reserved top-level key the pipeline writes under.
pub const DERIVED_ROOT: &str = "derived";

// =============================================================================
// Derived Field Registry
// =============================================================================

/// The closed set of derived fields, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedField {
    ClientAddressing,
    EventDate,
    EventPrettyDate,
    Caterers,
    HoursTime,
    HoursTotal,
    OfferNumber,
    OfferCosts,
    OfferTaxes,
    OfferTotal,
    InvoiceCosts,
    InvoiceTaxes,
    InvoiceTotal,
    InvoiceLongNumber,
}

impl DerivedField {
    /// Every derived field, in the order the pipeline runs them.
    ///
    /// Adding a field means registering both its name and its generator
    /// here, at the right position relative to its dependencies.
    pub const REGISTRY: &'static [DerivedField] = &[
        DerivedField::ClientAddressing,
        DerivedField::EventDate,
        DerivedField::EventPrettyDate,
        DerivedField::Caterers,
        DerivedField::HoursTime,
        DerivedField::HoursTotal,
        DerivedField::OfferNumber,
        DerivedField::OfferCosts,
        DerivedField::OfferTaxes,
        DerivedField::OfferTotal,
        DerivedField::InvoiceCosts,
        DerivedField::InvoiceTaxes,
        DerivedField::InvoiceTotal,
        DerivedField::InvoiceLongNumber,
    ];

    /// The registered name of the field.
    pub const fn name(&self) -> &'static str {
        match self {
            DerivedField::ClientAddressing => "client_addressing",
            DerivedField::EventDate => "event_date",
            DerivedField::EventPrettyDate => "event_prettydate",
            DerivedField::Caterers => "caterers",
            DerivedField::HoursTime => "hours_time",
            DerivedField::HoursTotal => "hours_total",
            DerivedField::OfferNumber => "offer_number",
            DerivedField::OfferCosts => "offer_costs",
            DerivedField::OfferTaxes => "offer_taxes",
            DerivedField::OfferTotal => "offer_total",
            DerivedField::InvoiceCosts => "invoice_costs",
            DerivedField::InvoiceTaxes => "invoice_taxes",
            DerivedField::InvoiceTotal => "invoice_total",
            DerivedField::InvoiceLongNumber => "invoice_longnumber",
        }
    }

    /// Looks a field up by its registered name.
    ///
    /// An unknown name is a fatal configuration error: the registry is
    /// closed and checked here, not discovered at runtime.
    pub fn lookup(name: &str) -> CoreResult<Self> {
        Self::REGISTRY
            .iter()
            .copied()
            .find(|field| field.name() == name)
            .ok_or_else(|| CoreError::UnknownDerivedField(name.to_string()))
    }

    /// The document path the field is written to.
    pub fn target(&self) -> FieldPath {
        FieldPath::parse(&format!("{DERIVED_ROOT}/{}", self.name()))
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Runs the registered generators over a normalized document.
pub struct DerivedFieldPipeline<'a> {
    settings: &'a Settings,
}

impl<'a> DerivedFieldPipeline<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        DerivedFieldPipeline { settings }
    }

    /// Computes every registered derived field in order.
    ///
    /// A generator whose inputs are absent (already flagged by the field
    /// reads) produces nothing; everything else is written back under the
    /// reserved `derived` mapping.
    pub fn run(&self, doc: &mut Document) -> CoreResult<()> {
        for field in DerivedField::REGISTRY {
            if let Some(value) = self.generate(*field, doc)? {
                path::set(doc, &field.target(), value)?;
            }
        }
        debug!("derived field pipeline complete");
        Ok(())
    }

    /// Generates one derived value by registered name.
    pub fn generate_named(&self, name: &str, doc: &Document) -> CoreResult<Option<Value>> {
        self.generate(DerivedField::lookup(name)?, doc)
    }

    /// Dispatches one generator. Exhaustive over the closed enum.
    fn generate(&self, field: DerivedField, doc: &Document) -> CoreResult<Option<Value>> {
        let value = match field {
            DerivedField::ClientAddressing => self.client_addressing(doc),
            DerivedField::EventDate => event_date(doc),
            DerivedField::EventPrettyDate => event_prettydate(doc),
            DerivedField::Caterers => caterers(doc),
            DerivedField::HoursTime => hours_time(doc),
            DerivedField::HoursTotal => hours_total(doc),
            DerivedField::OfferNumber => offer_number(doc),
            DerivedField::OfferCosts => self.sums(doc)?.map(|s| money(s.cost(Perspective::Offered))),
            DerivedField::OfferTaxes => self.sums(doc)?.map(|s| money(s.tax(Perspective::Offered))),
            DerivedField::OfferTotal => total_from_derived(doc, "offer_costs", "offer_taxes"),
            DerivedField::InvoiceCosts => {
                self.sums(doc)?.map(|s| money(s.cost(Perspective::Invoiced)))
            }
            DerivedField::InvoiceTaxes => {
                self.sums(doc)?.map(|s| money(s.tax(Perspective::Invoiced)))
            }
            DerivedField::InvoiceTotal => total_from_derived(doc, "invoice_costs", "invoice_taxes"),
            DerivedField::InvoiceLongNumber => invoice_longnumber(doc),
        };
        Ok(value)
    }

    /// Salutation from the localized templates: the female form when the
    /// client title carries a configured female keyword.
    fn client_addressing(&self, doc: &Document) -> Option<Value> {
        let title = path::get_str(doc, "client/title")?;
        let last_name = path::get_str(doc, "client/last_name")?;

        let addressing = &self.settings.addressing;
        let female = addressing
            .female_keywords
            .iter()
            .any(|keyword| title.contains(keyword.as_str()));
        let opener = if female {
            &addressing.polite_female
        } else {
            &addressing.polite_male
        };
        Some(Value::String(format!("{opener} {title} {last_name}")))
    }

    /// Folds the reconciled line items into document-level sums.
    fn sums(&self, doc: &Document) -> CoreResult<Option<ItemSums>> {
        let tax_rate = self.settings.tax_rate()?;
        let Some(Value::Mapping(products)) = path::get(doc, &FieldPath::parse("products")) else {
            return Ok(None);
        };

        let mut sums = ItemSums::zero();
        for (name, item) in products {
            let name = name.as_str().unwrap_or_default();
            let Some(price) = item.get("price").and_then(|v| money_from_yaml(v).ok()) else {
                continue;
            };
            let Some(amount) = item.get("amount").and_then(Value::as_i64) else {
                continue;
            };
            let sold = item.get("sold").and_then(Value::as_i64);
            let returned = item.get("returned").and_then(Value::as_i64);

            // The field reads leave both quantities in place once they
            // reconcile; treat a consistent pair as a delivered quantity and
            // skip anything still contradictory (already flagged).
            let (delivered, returned) = match (sold, returned) {
                (Some(s), Some(r)) if s + r == amount => (Some(s), None),
                (Some(_), Some(_)) => continue,
                other => other,
            };
            match LineItem::reconcile(name, price, amount, delivered, returned, tax_rate) {
                Ok(item) => sums = item.combine(sums),
                Err(_) => continue,
            }
        }
        Ok(Some(sums))
    }
}

// =============================================================================
// Generators
// =============================================================================

fn money(value: Money) -> Value {
    Value::String(value.to_decimal_string())
}

fn event_date(doc: &Document) -> Option<Value> {
    let begin = path::get_str(doc, "event/dates/0/begin").and_then(parse_date)?;
    Some(Value::String(crate::types::iso(begin)))
}

/// Human-facing date spelling: "17.07.2013", "17.-18.07.2013" within one
/// month, "28.07.2013 - 02.08.2013" across months.
fn event_prettydate(doc: &Document) -> Option<Value> {
    let begin = path::get_str(doc, "event/dates/0/begin").and_then(parse_date)?;
    let end = path::get_str(doc, "event/dates/0/end")
        .and_then(parse_date)
        .unwrap_or(begin);

    let pretty = if begin == end {
        begin.format("%d.%m.%Y").to_string()
    } else if begin.month() == end.month() && begin.year() == end.year() {
        format!("{}.-{}", begin.format("%d"), end.format("%d.%m.%Y"))
    } else {
        format!("{} - {}", begin.format("%d.%m.%Y"), end.format("%d.%m.%Y"))
    };
    Some(Value::String(pretty))
}

fn caterers(doc: &Document) -> Option<Value> {
    let Some(Value::Mapping(caterers)) = path::get(doc, &FieldPath::parse("hours/caterers"))
    else {
        return None;
    };
    let names = caterers
        .keys()
        .filter_map(Value::as_str)
        .map(|name| Value::String(name.to_string()))
        .collect();
    Some(Value::Sequence(names))
}

/// Exact centi-hour sum over all caterers.
fn hours_time(doc: &Document) -> Option<Value> {
    let Some(Value::Mapping(caterers)) = path::get(doc, &FieldPath::parse("hours/caterers"))
    else {
        return None;
    };
    let mut centi_hours: i64 = 0;
    for (_, hours) in caterers {
        centi_hours += scaled_from_yaml(hours, 2).ok()?;
    }
    Some(Value::String(format!(
        "{}.{:02}",
        centi_hours / 100,
        (centi_hours % 100).abs()
    )))
}

/// salary × hours, rounded half-to-even at the multiplication boundary
/// like every other rate multiplication.
fn hours_total(doc: &Document) -> Option<Value> {
    let salary = path::get(doc, &FieldPath::parse("hours/salary"))
        .and_then(|v| money_from_yaml(v).ok())?;
    let centi_hours = path::get_str(doc, "derived/hours_time")
        .and_then(|raw| crate::money::parse_scaled(raw, 2).ok())?;

    let minor = div_round_half_even(salary.minor_units() as i128 * centi_hours as i128, 100);
    Some(money(Money::from_minor_units(minor)))
}

/// "A%Y%m%d-<appendix>" from the offer date, appendix defaulting to 1.
fn offer_number(doc: &Document) -> Option<Value> {
    let date = path::get_str(doc, "offer/date").and_then(parse_date)?;
    let appendix = path::get(doc, &FieldPath::parse("offer/appendix"))
        .and_then(Value::as_i64)
        .unwrap_or(1);
    Some(Value::String(format!(
        "A{}-{appendix}",
        date.format("%Y%m%d")
    )))
}

/// Sum of two earlier derived money fields; absent inputs produce nothing.
fn total_from_derived(doc: &Document, costs: &str, taxes: &str) -> Option<Value> {
    let costs = path::get_str(doc, &format!("{DERIVED_ROOT}/{costs}"))
        .and_then(|raw| Money::parse(raw).ok())?;
    let taxes = path::get_str(doc, &format!("{DERIVED_ROOT}/{taxes}"))
        .and_then(|raw| Money::parse(raw).ok())?;
    Some(money(costs + taxes))
}

/// Long-form invoice number embedding the event year: "R027" → "R2013-027".
fn invoice_longnumber(doc: &Document) -> Option<Value> {
    let number = path::get_str(doc, "invoice/number")?;
    if !is_invoice_number(number) {
        return None;
    }
    let year = path::get_str(doc, "derived/event_date")
        .and_then(parse_date)?
        .year();
    let (letter, digits) = number.split_at(1);
    Some(Value::String(format!("{letter}{year}-{digits}")))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
format: 2.4.0
client:
  title: Herr
  last_name: Doe
event:
  dates:
    - begin: 2013-07-17
      end: 2013-07-18
offer:
  date: 2013-07-16
  appendix: 1
invoice:
  number: R027
products:
  beer:
    price: \"10.00\"
    amount: 5
    sold: 3
    returned: 2
hours:
  salary: \"8.00\"
  caterers:
    Name: 5
    Name2: 2.6
";

    fn derived(yaml: &str) -> Document {
        let mut doc: Document = serde_yaml::from_str(yaml).unwrap();
        let settings = Settings::default();
        DerivedFieldPipeline::new(&settings).run(&mut doc).unwrap();
        doc
    }

    fn derived_str<'a>(doc: &'a Document, name: &str) -> Option<&'a str> {
        path::get_str(doc, &format!("derived/{name}"))
    }

    #[test]
    fn test_registry_names_round_trip() {
        for field in DerivedField::REGISTRY {
            assert_eq!(DerivedField::lookup(field.name()).unwrap(), *field);
        }
    }

    #[test]
    fn test_unknown_name_is_fatal() {
        assert!(matches!(
            DerivedField::lookup("grand_total"),
            Err(CoreError::UnknownDerivedField(name)) if name == "grand_total"
        ));
    }

    #[test]
    fn test_cost_tax_total_sums() {
        let doc = derived(DOC);
        // offered: 10.00 × 5; invoiced: 10.00 × 3; tax 19%
        assert_eq!(derived_str(&doc, "offer_costs"), Some("50.00"));
        assert_eq!(derived_str(&doc, "offer_taxes"), Some("9.50"));
        assert_eq!(derived_str(&doc, "offer_total"), Some("59.50"));
        assert_eq!(derived_str(&doc, "invoice_costs"), Some("30.00"));
        assert_eq!(derived_str(&doc, "invoice_taxes"), Some("5.70"));
        assert_eq!(derived_str(&doc, "invoice_total"), Some("35.70"));
    }

    #[test]
    fn test_numbers_and_dates() {
        let doc = derived(DOC);
        assert_eq!(derived_str(&doc, "offer_number"), Some("A20130716-1"));
        assert_eq!(derived_str(&doc, "invoice_longnumber"), Some("R2013-027"));
        assert_eq!(derived_str(&doc, "event_date"), Some("2013-07-17"));
        assert_eq!(derived_str(&doc, "event_prettydate"), Some("17.-18.07.2013"));
    }

    #[test]
    fn test_addressing_and_hours() {
        let doc = derived(DOC);
        assert_eq!(
            derived_str(&doc, "client_addressing"),
            Some("Sehr geehrter Herr Doe")
        );
        assert_eq!(derived_str(&doc, "hours_time"), Some("7.60"));
        // 8.00 × 7.6 = 60.80
        assert_eq!(derived_str(&doc, "hours_total"), Some("60.80"));

        let caterers = path::get(&doc, &FieldPath::parse("derived/caterers")).unwrap();
        let names: Vec<&str> = caterers
            .as_sequence()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(names, vec!["Name", "Name2"]);
    }

    #[test]
    fn test_female_salutation() {
        let doc = derived(
            "client:\n  title: Frau Professor Dr. Dr.\n  last_name: Doe\n",
        );
        assert_eq!(
            derived_str(&doc, "client_addressing"),
            Some("Sehr geehrte Frau Professor Dr. Dr. Doe")
        );
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let once = derived(DOC);
        let mut twice = once.clone();
        let settings = Settings::default();
        DerivedFieldPipeline::new(&settings).run(&mut twice).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_inputs_generate_nothing() {
        let doc = derived("manager: Bob\n");
        for name in ["client_addressing", "event_date", "offer_costs", "hours_total"] {
            assert!(derived_str(&doc, name).is_none(), "{name} should be absent");
        }
    }

    #[test]
    fn test_single_day_prettydate() {
        let doc = derived("event:\n  dates:\n    - begin: 2013-07-17\n");
        assert_eq!(derived_str(&doc, "event_prettydate"), Some("17.07.2013"));
    }
}
