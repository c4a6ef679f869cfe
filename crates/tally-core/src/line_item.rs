//! # Line Items
//!
//! Quantity reconciliation and per-perspective cost math for billable
//! line items.
//!
//! ## Two Perspectives
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  OFFERED   what was quoted to the client:   price × quoted quantity     │
//! │  INVOICED  what was actually delivered:     price × delivered quantity  │
//! │                                                                         │
//! │  Reconciliation invariant (always holds after construction):            │
//! │      delivered + returned == quoted                                     │
//! │                                                                         │
//! │  delivered given → returned = quoted − delivered                        │
//! │  returned given  → delivered = quoted − returned                        │
//! │  neither given   → delivered = quoted, returned = 0                     │
//! │  both given      → inconsistency, reported by the ledger                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `LineItem` is immutable once reconciled; a correction requires
//! constructing a new one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::{Money, TaxRate};

// =============================================================================
// Perspective
// =============================================================================

/// Which side of the ledger a quantity or amount belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Perspective {
    /// Quoted to the client (offer).
    Offered,
    /// Actually delivered (invoice).
    Invoiced,
}

// =============================================================================
// Reconciliation Error
// =============================================================================

/// A quantity combination that cannot be reconciled.
///
/// These are data-level failures: the field reader translates them into
/// ledger entries (`Inconsistent` / `OutOfRange`) and keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// Both delivered and returned were given explicitly and the caller
    /// must not silently resolve the redundancy.
    #[error("both delivered and returned quantities given")]
    BothGiven,

    /// Delivered exceeds the quoted quantity.
    #[error("delivered quantity exceeds quoted quantity")]
    DeliveredExceedsQuoted,

    /// Returned exceeds the quoted quantity.
    #[error("returned quantity exceeds quoted quantity")]
    ReturnedExceedsQuoted,
}

// =============================================================================
// Line Item
// =============================================================================

/// A reconciled, immutable billable line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    name: String,
    unit_price: Money,
    quoted: i64,
    delivered: i64,
    returned: i64,
    tax_rate: TaxRate,
}

impl LineItem {
    /// Reconciles the quantity fields and constructs the item.
    ///
    /// At most one of `delivered`/`returned` may be given; the other is
    /// inferred so that `delivered + returned == quoted` holds.
    pub fn reconcile(
        name: impl Into<String>,
        unit_price: Money,
        quoted: i64,
        delivered: Option<i64>,
        returned: Option<i64>,
        tax_rate: TaxRate,
    ) -> Result<Self, ReconcileError> {
        let (delivered, returned) = match (delivered, returned) {
            (Some(_), Some(_)) => return Err(ReconcileError::BothGiven),
            (Some(delivered), None) => {
                if delivered > quoted {
                    return Err(ReconcileError::DeliveredExceedsQuoted);
                }
                (delivered, quoted - delivered)
            }
            (None, Some(returned)) => {
                if returned > quoted {
                    return Err(ReconcileError::ReturnedExceedsQuoted);
                }
                (quoted - returned, returned)
            }
            (None, None) => (quoted, 0),
        };

        Ok(LineItem {
            name: name.into(),
            unit_price,
            quoted,
            delivered,
            returned,
            tax_rate,
        })
    }

    /// The item name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The frozen unit price.
    #[inline]
    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    /// The returned quantity.
    #[inline]
    pub fn returned(&self) -> i64 {
        self.returned
    }

    /// The quantity for a perspective: quoted or delivered.
    #[inline]
    pub fn quantity(&self, perspective: Perspective) -> i64 {
        match perspective {
            Perspective::Offered => self.quoted,
            Perspective::Invoiced => self.delivered,
        }
    }

    /// Cost for a perspective: price × quantity. Exact.
    pub fn cost(&self, perspective: Perspective) -> Money {
        self.unit_price.mul_quantity(self.quantity(perspective))
    }

    /// Tax for a perspective: cost × rate, rounded half-to-even.
    pub fn tax(&self, perspective: Perspective) -> Money {
        self.cost(perspective).tax(self.tax_rate)
    }

    /// Total for a perspective: cost + tax.
    pub fn total(&self, perspective: Perspective) -> Money {
        self.cost(perspective) + self.tax(perspective)
    }

    /// Folds this item into a running document-level sum.
    pub fn combine(&self, sums: ItemSums) -> ItemSums {
        ItemSums {
            quoted_quantity: sums.quoted_quantity + self.quoted,
            delivered_quantity: sums.delivered_quantity + self.delivered,
            offered_cost: sums.offered_cost + self.cost(Perspective::Offered),
            invoiced_cost: sums.invoiced_cost + self.cost(Perspective::Invoiced),
            offered_tax: sums.offered_tax + self.tax(Perspective::Offered),
            invoiced_tax: sums.invoiced_tax + self.tax(Perspective::Invoiced),
        }
    }
}

// =============================================================================
// Document-Level Sums
// =============================================================================

/// Pairwise sums over both perspectives, used for the derived document
/// totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemSums {
    pub quoted_quantity: i64,
    pub delivered_quantity: i64,
    pub offered_cost: Money,
    pub invoiced_cost: Money,
    pub offered_tax: Money,
    pub invoiced_tax: Money,
}

impl ItemSums {
    /// The empty sum.
    #[inline]
    pub fn zero() -> Self {
        ItemSums::default()
    }

    /// Cost sum for a perspective.
    #[inline]
    pub fn cost(&self, perspective: Perspective) -> Money {
        match perspective {
            Perspective::Offered => self.offered_cost,
            Perspective::Invoiced => self.invoiced_cost,
        }
    }

    /// Tax sum for a perspective.
    #[inline]
    pub fn tax(&self, perspective: Perspective) -> Money {
        match perspective {
            Perspective::Offered => self.offered_tax,
            Perspective::Invoiced => self.invoiced_tax,
        }
    }

    /// Total (cost + tax) for a perspective.
    #[inline]
    pub fn total(&self, perspective: Perspective) -> Money {
        self.cost(perspective) + self.tax(perspective)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
