//! Low-stock alert rules, evaluated by the scheduled stock check.

use serde::{Deserialize, Serialize};

use tailor_catalog::{ProductId, StoreId};
use tailor_core::{DomainError, DomainResult, typed_id};

use crate::ledger::StockLedger;

typed_id!(AlertRuleId);

/// Alert when a product's total quantity at a store (all sizes and colors)
/// drops below `min_quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlertRule {
    pub id: AlertRuleId,
    pub product: ProductId,
    pub store: StoreId,
    pub min_quantity: i64,
    pub active: bool,
}

impl StockAlertRule {
    pub fn new(
        id: AlertRuleId,
        product: ProductId,
        store: StoreId,
        min_quantity: i64,
    ) -> DomainResult<Self> {
        if min_quantity < 0 {
            return Err(DomainError::validation("alert minimum cannot be negative"));
        }
        Ok(Self {
            id,
            product,
            store,
            min_quantity,
            active: true,
        })
    }
}

/// A rule that fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlert {
    pub rule: AlertRuleId,
    pub product: ProductId,
    pub store: StoreId,
    pub quantity: i64,
    pub min_quantity: i64,
}

/// The set of configured rules, unique per (product, store).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockAlertRules {
    rules: Vec<StockAlertRule>,
}

impl StockAlertRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rule: StockAlertRule) -> DomainResult<()> {
        if self
            .rules
            .iter()
            .any(|r| r.product == rule.product && r.store == rule.store)
        {
            return Err(DomainError::conflict(format!(
                "an alert already exists for product {} at store {}",
                rule.product, rule.store
            )));
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn set_active(&mut self, id: AlertRuleId, active: bool) -> DomainResult<()> {
        let rule = self
            .rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| DomainError::missing(format!("stock alert {id}")))?;
        rule.active = active;
        Ok(())
    }

    pub fn get(&self, id: AlertRuleId) -> Option<&StockAlertRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StockAlertRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every active rule whose product total is strictly below its minimum.
    pub fn evaluate(&self, ledger: &StockLedger) -> Vec<StockAlert> {
        self.rules
            .iter()
            .filter(|r| r.active)
            .filter_map(|r| {
                let quantity = ledger.product_total(r.store, r.product);
                (quantity < r.min_quantity).then_some(StockAlert {
                    rule: r.id,
                    product: r.product,
                    store: r.store,
                    quantity,
                    min_quantity: r.min_quantity,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tailor_catalog::{ColorId, SizeId};
    use tailor_core::Aggregate;

    use crate::ledger::{
        ApplyMovements, LedgerId, MovementReference, MovementSource, StockCommand, StockKey,
        StockMovement,
    };

    fn stocked(store: StoreId, product: ProductId, quantities: &[i64]) -> StockLedger {
        let mut ledger = StockLedger::new(LedgerId::generate(), 10);
        let movements = quantities
            .iter()
            .map(|q| {
                StockMovement::inbound(
                    StockKey::new(store, product, SizeId::generate(), ColorId::generate()),
                    *q,
                )
            })
            .collect();
        let events = ledger
            .handle(&StockCommand::ApplyMovements(ApplyMovements {
                ledger_id: ledger.id_typed(),
                reference: MovementReference::new(MovementSource::Manual, "seed"),
                movements,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        ledger.apply_all(&events);
        ledger
    }

    #[test]
    fn duplicate_product_store_rule_is_a_conflict() {
        let (product, store) = (ProductId::generate(), StoreId::generate());
        let mut rules = StockAlertRules::new();
        rules
            .add(StockAlertRule::new(AlertRuleId::generate(), product, store, 5).unwrap())
            .unwrap();

        let err = rules
            .add(StockAlertRule::new(AlertRuleId::generate(), product, store, 8).unwrap())
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn totals_all_sizes_and_colors_and_skips_inactive() {
        let (product, store) = (ProductId::generate(), StoreId::generate());
        let ledger = stocked(store, product, &[3, 4]);

        let mut rules = StockAlertRules::new();
        let firing = StockAlertRule::new(AlertRuleId::generate(), product, store, 8).unwrap();
        let firing_id = firing.id;
        rules.add(firing).unwrap();
        rules
            .add(
                StockAlertRule::new(AlertRuleId::generate(), product, StoreId::generate(), 1)
                    .unwrap(),
            )
            .unwrap();

        let alerts = rules.evaluate(&ledger);
        // The second rule sees 0 at an empty store, which is below 1.
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].quantity, 7);
        assert_eq!(alerts[0].min_quantity, 8);

        rules.set_active(firing_id, false).unwrap();
        assert_eq!(rules.evaluate(&ledger).len(), 1);
    }

    #[test]
    fn total_equal_to_minimum_does_not_fire() {
        let (product, store) = (ProductId::generate(), StoreId::generate());
        let ledger = stocked(store, product, &[5]);
        let mut rules = StockAlertRules::new();
        rules
            .add(StockAlertRule::new(AlertRuleId::generate(), product, store, 5).unwrap())
            .unwrap();
        assert!(rules.evaluate(&ledger).is_empty());
    }
}
