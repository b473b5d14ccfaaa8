use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use facilities_core::{DomainError, DomainResult, ItemId};

/// Stock held for a catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLine {
    pub item_id: ItemId,
    #[serde(rename = "cantidad")]
    pub quantity: i32,
    #[serde(rename = "costo_unitario")]
    pub unit_cost: Decimal,
    #[serde(rename = "ubicacion_actual")]
    pub current_location: Option<String>,
    #[serde(rename = "fecha_actualizacion")]
    pub updated_at: DateTime<Utc>,
}

impl InventoryLine {
    /// Remove one unit (a component was installed from stock).
    pub fn take_one(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::invariant(format!(
                "no stock left for item {}",
                self.item_id
            )));
        }
        self.quantity -= 1;
        self.updated_at = at;
        Ok(())
    }

    /// Add stock, recalculating the average unit cost.
    pub fn restock(&mut self, restock: &Restock, at: DateTime<Utc>) -> DomainResult<()> {
        restock.validate()?;
        let total = self
            .quantity
            .checked_add(restock.quantity)
            .ok_or_else(|| DomainError::validation("cantidad overflows"))?;

        self.unit_cost = weighted_average_cost(
            self.quantity,
            self.unit_cost,
            restock.quantity,
            restock.unit_cost,
        )?;
        self.quantity = total;
        if let Some(location) = &restock.location {
            self.current_location = Some(location.clone());
        }
        self.updated_at = at;
        Ok(())
    }

    /// First receipt of an item.
    pub fn from_restock(item_id: ItemId, restock: &Restock, at: DateTime<Utc>) -> DomainResult<Self> {
        restock.validate()?;
        Ok(Self {
            item_id,
            quantity: restock.quantity,
            unit_cost: restock.unit_cost.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            current_location: restock.location.clone(),
            updated_at: at,
        })
    }
}

/// Largest cost a `NUMERIC(12, 2)` column holds.
pub const MAX_UNIT_COST: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// A stock receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restock {
    #[serde(rename = "cantidad")]
    pub quantity: i32,
    #[serde(rename = "costo_unitario")]
    pub unit_cost: Decimal,
    #[serde(rename = "ubicacion_actual", default)]
    pub location: Option<String>,
}

impl Restock {
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::validation("cantidad must be positive"));
        }
        if self.unit_cost.is_sign_negative() {
            return Err(DomainError::validation("costo_unitario cannot be negative"));
        }
        if self.unit_cost > MAX_UNIT_COST {
            return Err(DomainError::validation(format!(
                "costo_unitario cannot exceed {MAX_UNIT_COST}"
            )));
        }
        Ok(())
    }
}

/// Average cost after receiving `added_qty` units at `added_cost`, rounded to cents.
///
/// A line with no stock (or negative stock left over from corrections) takes
/// the incoming cost as-is.
pub fn weighted_average_cost(
    current_qty: i32,
    current_cost: Decimal,
    added_qty: i32,
    added_cost: Decimal,
) -> DomainResult<Decimal> {
    let overflow = || DomainError::validation("stock value is too large to average");

    let current_qty = Decimal::from(current_qty.max(0));
    let added_qty = Decimal::from(added_qty);
    let total_qty = current_qty + added_qty;
    if total_qty.is_zero() {
        return Ok(added_cost.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero));
    }
    let total_value = current_qty
        .checked_mul(current_cost)
        .and_then(|held| added_qty.checked_mul(added_cost).and_then(|new| held.checked_add(new)))
        .ok_or_else(overflow)?;
    let average = total_value.checked_div(total_qty).ok_or_else(overflow)?;
    Ok(average.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}
