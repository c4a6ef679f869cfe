//! # Schema Migration
//!
//! Migrates a legacy flat document (format `1.0.0`) into the current
//! hierarchical schema (format `2.4.0`).
//!
//! ## Migration Process
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Migration Process                                  │
//! │                                                                         │
//! │  legacy document (flat keys)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. rename rules: source path → target path into a fresh document      │
//! │     (targets are disjoint, so rule order does not matter)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. bespoke fixups that are not pure renames:                           │
//! │     - split signature block → manager name (second line)                │
//! │     - split client fullname → title + surname (or flag it)              │
//! │     - parse "17-18.07.2013" date-range token → begin/end pair           │
//! │     - stamp created/offer-date/invoice-date sentinels                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  3. graft: unconsumed legacy keys survive; migrated keys win            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  fully migrated document, format = "2.4.0"; legacy input discarded      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine is pure with respect to the rest of the system: it never
//! touches the `ValidationLedger` or `Money`. Failures it detects are
//! returned in the [`MigrationOutcome`] for the orchestrator to record.

use chrono::NaiveDate;
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::ledger::{FieldError, FieldErrorKind, FieldTag};
use crate::path::{self, Document, FieldPath};
use crate::types::{iso, parse_date_range};

// =============================================================================
// Transform Rules
// =============================================================================

/// A declarative rename: read `source` from the legacy document, write to
/// `target` in the result.
#[derive(Debug, Clone, Copy)]
pub struct TransformRule {
    pub source: &'static str,
    pub target: &'static str,
}

/// The 1.0.0 → 2.4.0 rename table.
///
/// Targets are pairwise disjoint; [`TransformationEngine::migrate`] enforces
/// this before applying anything.
pub const RENAME_RULES: &[TransformRule] = &[
    TransformRule { source: "client", target: "client/fullname" },
    TransformRule { source: "address", target: "client/address" },
    TransformRule { source: "email", target: "client/email" },
    TransformRule { source: "event", target: "event/name" },
    TransformRule { source: "location", target: "event/location" },
    TransformRule { source: "description", target: "event/description" },
    TransformRule { source: "manumber", target: "offer/number" },
    TransformRule { source: "anumber", target: "offer/appendix" },
    TransformRule { source: "rnumber", target: "invoice/number" },
    TransformRule { source: "payed_date", target: "invoice/payed_date" },
    TransformRule { source: "invoice_date", target: "invoice/date" },
    TransformRule { source: "signature", target: "manager" },
];

/// Legacy keys consumed by fixups instead of rename rules.
const FIXUP_SOURCES: &[&str] = &["date", "time", "time_end", "format"];

/// Sentinel stamped into `created` for documents that predate the field.
pub const CREATED_SENTINEL: &str = "01.01.0000";

// =============================================================================
// Migration Outcome
// =============================================================================

/// The result of a migration run.
///
/// `failures` carries the data-level problems the fixups detected; the
/// orchestrator appends them to its ledger, keeping the engine itself pure.
#[derive(Debug)]
pub struct MigrationOutcome {
    pub document: Document,
    pub failures: Vec<FieldError>,
}

// =============================================================================
// Transformation Engine
// =============================================================================

/// Migrates legacy documents. Applies only to documents whose declared
/// format is below the current baseline; the caller checks the version.
#[derive(Debug, Clone, Copy)]
pub struct TransformationEngine {
    /// Migration-time date for the `offer/date`/`invoice/date` sentinels.
    today: NaiveDate,
}

impl TransformationEngine {
    /// Creates an engine stamping `today` into newly introduced date fields.
    pub fn new(today: NaiveDate) -> Self {
        TransformationEngine { today }
    }

    /// Migrates a legacy document into the current schema.
    ///
    /// Deterministic: rule application is order-independent because targets
    /// are disjoint (enforced up front). The legacy input is consumed.
    pub fn migrate(&self, legacy: Document) -> CoreResult<MigrationOutcome> {
        verify_disjoint_targets()?;
        debug!(rules = RENAME_RULES.len(), "migrating legacy document");

        let mut failures = Vec::new();
        let mut migrated = Value::Mapping(Mapping::new());

        // 1. Declarative renames into the fresh result document.
        for rule in RENAME_RULES {
            if let Some(value) = path::get(&legacy, &FieldPath::parse(rule.source)) {
                path::set(&mut migrated, &FieldPath::parse(rule.target), value.clone())?;
            }
        }

        // 2. Bespoke fixups.
        self.fix_event_dates(&legacy, &mut migrated, &mut failures)?;
        fix_manager(&mut migrated)?;
        fix_client_name(&mut migrated, &mut failures)?;
        self.stamp_sentinels(&mut migrated)?;

        // 3. Unconsumed legacy keys survive the migration; on a top-level
        //    conflict the migrated value wins.
        let mut document = leftover_keys(legacy);
        path::graft(&mut document, migrated)?;

        if !failures.is_empty() {
            warn!(count = failures.len(), "migration flagged unsplittable fields");
        }
        Ok(MigrationOutcome { document, failures })
    }

    /// Parses the legacy `date` token into the `event/dates/0` begin/end
    /// pair. A single date is a zero-length range and keeps its legacy
    /// `time`/`time_end` scalars.
    fn fix_event_dates(
        &self,
        legacy: &Document,
        migrated: &mut Document,
        failures: &mut Vec<FieldError>,
    ) -> CoreResult<()> {
        let Some(raw) = path::get_str(legacy, "date") else {
            return Ok(());
        };

        let Some(range) = parse_date_range(raw) else {
            failures.push(FieldError {
                field: FieldTag::Date,
                reason: FieldErrorKind::Malformed,
            });
            return Ok(());
        };

        path::set(
            migrated,
            &FieldPath::parse("event/dates/0/begin"),
            Value::String(iso(range.begin)),
        )?;
        path::set(
            migrated,
            &FieldPath::parse("event/dates/0/end"),
            Value::String(iso(range.end)),
        )?;

        if range.is_single_day() {
            for (legacy_key, target) in [
                ("time", "event/dates/0/time/begin"),
                ("time_end", "event/dates/0/time/end"),
            ] {
                if let Some(time) = path::get_str(legacy, legacy_key) {
                    path::set(
                        migrated,
                        &FieldPath::parse(target),
                        Value::String(time.to_string()),
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Stamps the fields the legacy schema did not have. `created` is
    /// always the fixed sentinel; the offer/invoice dates default to the
    /// migration date only where the rules left them absent.
    fn stamp_sentinels(&self, migrated: &mut Document) -> CoreResult<()> {
        path::set(
            migrated,
            &FieldPath::parse("created"),
            Value::String(CREATED_SENTINEL.to_string()),
        )?;
        for target in ["offer/date", "invoice/date"] {
            let target = FieldPath::parse(target);
            if !path::has(migrated, &target) {
                path::set(migrated, &target, Value::String(iso(self.today)))?;
            }
        }
        path::set(
            migrated,
            &FieldPath::parse("format"),
            Value::String(crate::BASELINE_FORMAT_VERSION.to_string()),
        )
    }
}

// =============================================================================
// Fixup Helpers
// =============================================================================

/// The signature block's first line is a closing phrase; the manager name
/// is the second line, when one is present.
fn fix_manager(migrated: &mut Document) -> CoreResult<()> {
    let Some(block) = path::get_str(migrated, "manager") else {
        return Ok(());
    };
    let mut lines = block.lines().filter(|l| !l.trim().is_empty());
    let first = lines.next();
    if let (Some(_), Some(second)) = (first, lines.next()) {
        let manager = second.trim().to_string();
        path::set(
            migrated,
            &FieldPath::parse("manager"),
            Value::String(manager),
        )?;
    }
    Ok(())
}

/// Splits the multi-line client block into title (first line) and surname
/// (second line). A single unsplittable token is flagged, never guessed at.
fn fix_client_name(migrated: &mut Document, failures: &mut Vec<FieldError>) -> CoreResult<()> {
    let Some(block) = path::get_str(migrated, "client/fullname") else {
        return Ok(());
    };

    let lines: Vec<&str> = block
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.len() < 2 {
        failures.push(FieldError {
            field: FieldTag::ClientFullname,
            reason: FieldErrorKind::Malformed,
        });
        return Ok(());
    }

    let title = lines[0].to_string();
    let last_name = lines[1].to_string();
    let fullname = lines.join(" ");
    path::set(
        migrated,
        &FieldPath::parse("client/title"),
        Value::String(title),
    )?;
    path::set(
        migrated,
        &FieldPath::parse("client/last_name"),
        Value::String(last_name),
    )?;
    path::set(
        migrated,
        &FieldPath::parse("client/fullname"),
        Value::String(fullname),
    )
}

/// The legacy top-level keys neither renamed nor consumed by a fixup.
fn leftover_keys(legacy: Document) -> Document {
    let Value::Mapping(legacy) = legacy else {
        return Value::Mapping(Mapping::new());
    };
    let consumed = |key: &str| {
        RENAME_RULES.iter().any(|r| r.source == key) || FIXUP_SOURCES.contains(&key)
    };
    let leftover: Mapping = legacy
        .into_iter()
        .filter(|(key, _)| match key.as_str() {
            Some(key) => !consumed(key),
            None => true,
        })
        .collect();
    Value::Mapping(leftover)
}

/// Rules with overlapping targets are disallowed: application would stop
/// being order-independent.
fn verify_disjoint_targets() -> CoreResult<()> {
    for (i, a) in RENAME_RULES.iter().enumerate() {
        for b in &RENAME_RULES[i + 1..] {
            let pa = FieldPath::parse(a.target);
            let pb = FieldPath::parse(b.target);
            if pa.is_prefix_of(&pb) || pb.is_prefix_of(&pa) {
                return Err(CoreError::OverlappingRuleTargets(b.target.to_string()));
            }
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
