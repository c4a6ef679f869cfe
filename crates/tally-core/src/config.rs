//! # Settings
//!
//! Immutable configuration for the document core.
//!
//! ## Configuration Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Ownership                              │
//! │                                                                         │
//! │  Process-level loading (CLI, config file)  ← OUT OF SCOPE              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Settings value (this module, serde-deserializable)                    │
//! │       │                                                                 │
//! │       ├──► ProjectDocument::new(settings)                              │
//! │       ├──► DerivedFieldPipeline (salutation templates, tax, currency)  │
//! │       └──► Money::format_with(&settings.currency)                      │
//! │                                                                         │
//! │  There is NO process-wide mutable settings singleton. Every component  │
//! │  receives an explicit immutable value at construction time.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::money::TaxRate;

// =============================================================================
// Currency
// =============================================================================

/// Rendering conventions for the configured currency.
///
/// The monetary model itself is currency-agnostic integer minor units; this
/// type only controls how a value is formatted for humans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Currency {
    /// Currency symbol, e.g. `€`.
    pub symbol: String,

    /// Separator between major and minor units.
    pub decimal_separator: char,

    /// Separator between groups of three major-unit digits, if any.
    pub thousands_separator: Option<char>,

    /// Whether the symbol precedes the amount (`$10.00`) or trails it
    /// (`10,00 €`).
    pub symbol_leads: bool,
}

impl Default for Currency {
    fn default() -> Self {
        // German conventions: "1.234,56 €"
        Currency {
            symbol: "€".to_string(),
            decimal_separator: ',',
            thousands_separator: Some('.'),
            symbol_leads: false,
        }
    }
}

// =============================================================================
// Salutation Templates
// =============================================================================

/// Localized templates for the derived client salutation.
///
/// Consumed as data: the address/localization string tables are maintained
/// outside this core and deserialized into this struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Addressing {
    /// Salutation opener used when no female keyword matches the title.
    pub polite_male: String,

    /// Salutation opener used when the client title contains a female
    /// keyword.
    pub polite_female: String,

    /// Title tokens that select the female salutation form.
    pub female_keywords: Vec<String>,
}

impl Default for Addressing {
    fn default() -> Self {
        Addressing {
            polite_male: "Sehr geehrter".to_string(),
            polite_female: "Sehr geehrte".to_string(),
            female_keywords: vec!["Frau".to_string()],
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Immutable configuration passed into every component constructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Default tax rate in basis points (1900 = 19%).
    ///
    /// Validated through [`Settings::tax_rate`]; a value above 10000 bps is
    /// a fatal configuration error, not a document-validation failure.
    pub tax_rate_bps: u32,

    /// Document language tag, used as the default for the `lang` field.
    pub lang: String,

    /// Currency rendering conventions.
    pub currency: Currency,

    /// Salutation templates for the derived client addressing.
    pub addressing: Addressing,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            tax_rate_bps: 1900,
            lang: "de".to_string(),
            currency: Currency::default(),
            addressing: Addressing::default(),
        }
    }
}

impl Settings {
    /// Returns the configured default tax rate.
    ///
    /// Fails with [`crate::CoreError::TaxRateOutOfRange`] when the
    /// configured value exceeds 100%.
    pub fn tax_rate(&self) -> CoreResult<TaxRate> {
        TaxRate::from_bps(self.tax_rate_bps)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
