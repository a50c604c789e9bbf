use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tailor_catalog::{ProductId, StoreId};
use tailor_core::{Aggregate, DomainError};
use tailor_stock::{
    AddCountLine, AddTransferLine, AlertRuleId, ApplyMovements, CountCommand, CountEvent, CountId,
    CountTransition, CreateCount, CreateTransfer, InventoryCount, MovementReference,
    MovementSource, RecordCount, RemoveTransferLine, SetMinQuantity, SetQuantities, StartCount,
    StockAlert, StockAlertRule, StockCommand, StockKey, StockMovement, StockRecord, Transfer,
    TransferCommand, TransferEvent, TransferId, TransferTransition, Variant,
};

use super::{Backoffice, COUNT, LEDGER, State, TRANSFER, found};
use crate::error::BackofficeResult;
use crate::journal::JournalBatch;
use crate::notify::OutboundMessage;
use crate::repository::Repository;
use crate::sequence::SequenceCode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransfer {
    pub store_from: StoreId,
    pub store_to: StoreId,
    pub date: NaiveDate,
    pub notes: Option<String>,
}

const MANUAL_ADJUSTMENT: &str = "manual adjustment";

impl State {
    fn transfer_transition(
        &mut self,
        transfer_id: TransferId,
        command: TransferCommand,
        source: MovementSource,
        movements: fn(&Transfer) -> Vec<StockMovement>,
    ) -> BackofficeResult<()> {
        let result = self.execute_with_stock(
            |s| &mut s.transfers,
            &transfer_id,
            TRANSFER,
            &command,
            |transfer| (transfer.movement_reference(source), movements(transfer)),
        );
        match result {
            Ok(_) => {
                info!(transfer = %transfer_id, source = ?source, "transfer transition applied");
                Ok(())
            }
            Err(err) => {
                warn!(
                    transfer = %transfer_id,
                    source = ?source,
                    error = %err,
                    "transfer transition rejected"
                );
                Err(err)
            }
        }
    }
}

impl Backoffice {
    /// Manual correction of one stock record; returns the new quantity.
    pub fn adjust_stock(&self, key: StockKey, delta: i64) -> BackofficeResult<i64> {
        self.write(|s| {
            s.require_store(key.store)?;
            s.require_variant(&key.variant())?;
            let events = s.ledger.handle(&StockCommand::ApplyMovements(ApplyMovements {
                ledger_id: s.ledger.id_typed(),
                reference: MovementReference::new(MovementSource::Manual, MANUAL_ADJUSTMENT),
                movements: vec![StockMovement::new(key, delta)],
                occurred_at: Utc::now(),
            }))?;
            let mut batch = JournalBatch::new();
            s.stage(&mut batch, s.ledger.id_typed(), LEDGER, &events)?;

            s.ledger.apply_all(&events);
            s.journal.commit(batch);
            let quantity = s.ledger.available(&key);
            info!(%key, delta, quantity, "stock adjusted");
            Ok(quantity)
        })
    }

    pub fn set_min_quantity(&self, key: StockKey, min_quantity: i64) -> BackofficeResult<()> {
        self.write(|s| {
            let events = s.ledger.handle(&StockCommand::SetMinQuantity(SetMinQuantity {
                ledger_id: s.ledger.id_typed(),
                key,
                min_quantity,
                occurred_at: Utc::now(),
            }))?;
            let mut batch = JournalBatch::new();
            s.stage(&mut batch, s.ledger.id_typed(), LEDGER, &events)?;

            s.ledger.apply_all(&events);
            s.journal.commit(batch);
            Ok(())
        })
    }

    pub fn stock_record(&self, key: StockKey) -> BackofficeResult<Option<StockRecord>> {
        self.read(|s| s.ledger.record(&key).cloned())
    }

    /// Quantity on hand; 0 when no record exists.
    pub fn available(&self, key: StockKey) -> BackofficeResult<i64> {
        self.read(|s| s.ledger.available(&key))
    }

    pub fn stock_records(&self, store: StoreId) -> BackofficeResult<Vec<StockRecord>> {
        self.read(|s| s.ledger.records_for_store(store).cloned().collect())
    }

    pub fn add_stock_alert(
        &self,
        product: ProductId,
        store: StoreId,
        min_quantity: i64,
    ) -> BackofficeResult<AlertRuleId> {
        self.write(|s| {
            s.require_store(store)?;
            found(&s.products, &product, "product")?;
            let id = AlertRuleId::generate();
            s.alert_rules
                .add(StockAlertRule::new(id, product, store, min_quantity)?)?;
            info!(rule = %id, %product, %store, min_quantity, "stock alert added");
            Ok(id)
        })
    }

    pub fn set_stock_alert_active(&self, id: AlertRuleId, active: bool) -> BackofficeResult<()> {
        self.write(|s| {
            s.alert_rules.set_active(id, active)?;
            Ok(())
        })
    }

    pub fn stock_alert_rules(&self) -> BackofficeResult<Vec<StockAlertRule>> {
        self.read(|s| s.alert_rules.iter().cloned().collect())
    }

    /// Scheduled check: dispatch one message per active rule whose product
    /// total at the store is below its minimum.
    ///
    /// Messages are sent after the state lock is released.
    pub fn check_stock_alerts(&self) -> BackofficeResult<Vec<StockAlert>> {
        let (alerts, messages) = self.read(|s| {
            let alerts = s.alert_rules.evaluate(&s.ledger);
            let messages: Vec<OutboundMessage> = alerts
                .iter()
                .map(|alert| {
                    let product = s
                        .products
                        .get(&alert.product)
                        .map(|p| p.name().to_string())
                        .unwrap_or_else(|| alert.product.to_string());
                    let store = s
                        .stores
                        .get(&alert.store)
                        .map(|st| st.name.clone())
                        .unwrap_or_else(|| alert.store.to_string());
                    OutboundMessage {
                        address: self.alert_address.clone(),
                        subject: format!("Low stock: {product} at {store}"),
                        body: format!(
                            "{product} at {store}: {} in stock, minimum {}.",
                            alert.quantity, alert.min_quantity
                        ),
                    }
                })
                .collect();
            (alerts, messages)
        })?;

        for (alert, message) in alerts.iter().zip(messages) {
            warn!(
                product = %alert.product,
                store = %alert.store,
                quantity = alert.quantity,
                min_quantity = alert.min_quantity,
                "stock below alert minimum"
            );
            self.notifier.dispatch(message)?;
        }
        Ok(alerts)
    }

    pub fn create_transfer(&self, transfer: NewTransfer) -> BackofficeResult<TransferId> {
        self.write(|s| {
            s.require_store(transfer.store_from)?;
            s.require_store(transfer.store_to)?;

            let transfer_id = TransferId::generate();
            let name = s.sequences.peek(SequenceCode::Transfer);
            s.create(
                |s| &mut s.transfers,
                transfer_id,
                Transfer::empty(transfer_id),
                TRANSFER,
                &TransferCommand::CreateTransfer(CreateTransfer {
                    transfer_id,
                    name: name.clone(),
                    store_from: transfer.store_from,
                    store_to: transfer.store_to,
                    date: transfer.date,
                    notes: transfer.notes,
                    occurred_at: Utc::now(),
                }),
            )?;
            s.sequences.next(SequenceCode::Transfer);
            info!(transfer = %transfer_id, %name, "transfer created");
            Ok(transfer_id)
        })
    }

    /// Returns the new line number.
    pub fn add_transfer_line(
        &self,
        transfer_id: TransferId,
        variant: Variant,
        quantity: i64,
    ) -> BackofficeResult<u32> {
        self.write(|s| {
            s.require_variant(&variant)?;
            let events = s.execute(
                |s| &mut s.transfers,
                &transfer_id,
                TRANSFER,
                &TransferCommand::AddLine(AddTransferLine {
                    transfer_id,
                    variant,
                    quantity,
                    occurred_at: Utc::now(),
                }),
            )?;
            events
                .iter()
                .find_map(|e| match e {
                    TransferEvent::LineAdded(added) => Some(added.line_no),
                    _ => None,
                })
                .ok_or_else(|| DomainError::invariant("transfer line was not added").into())
        })
    }

    pub fn remove_transfer_line(
        &self,
        transfer_id: TransferId,
        line_no: u32,
    ) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.transfers,
                &transfer_id,
                TRANSFER,
                &TransferCommand::RemoveLine(RemoveTransferLine {
                    transfer_id,
                    line_no,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })
    }

    /// Takes the goods out of the source store.
    pub fn confirm_transfer(&self, transfer_id: TransferId) -> BackofficeResult<()> {
        self.write(|s| {
            s.transfer_transition(
                transfer_id,
                TransferCommand::Confirm(TransferTransition {
                    transfer_id,
                    occurred_at: Utc::now(),
                }),
                MovementSource::TransferOut,
                Transfer::confirm_movements,
            )
        })
    }

    /// Puts the goods into the destination store.
    pub fn complete_transfer(&self, transfer_id: TransferId) -> BackofficeResult<()> {
        self.write(|s| {
            s.transfer_transition(
                transfer_id,
                TransferCommand::Complete(TransferTransition {
                    transfer_id,
                    occurred_at: Utc::now(),
                }),
                MovementSource::TransferIn,
                Transfer::complete_movements,
            )
        })
    }

    /// A confirmed transfer gives the goods back to the source store.
    pub fn cancel_transfer(&self, transfer_id: TransferId) -> BackofficeResult<()> {
        self.write(|s| {
            s.transfer_transition(
                transfer_id,
                TransferCommand::Cancel(TransferTransition {
                    transfer_id,
                    occurred_at: Utc::now(),
                }),
                MovementSource::TransferCancellation,
                Transfer::cancel_movements,
            )
        })
    }

    pub fn reset_transfer_to_draft(&self, transfer_id: TransferId) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.transfers,
                &transfer_id,
                TRANSFER,
                &TransferCommand::ResetToDraft(TransferTransition {
                    transfer_id,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })
    }

    pub fn transfer(&self, transfer_id: TransferId) -> BackofficeResult<Option<Transfer>> {
        self.read(|s| s.transfers.get(&transfer_id).cloned())
    }

    pub fn transfers(&self) -> BackofficeResult<Vec<Transfer>> {
        self.read(|s| s.transfers.values().cloned().collect())
    }

    pub fn create_count(
        &self,
        store: StoreId,
        date: NaiveDate,
        notes: Option<String>,
    ) -> BackofficeResult<CountId> {
        self.write(|s| {
            s.require_store(store)?;
            let count_id = CountId::generate();
            let name = s.sequences.peek(SequenceCode::InventoryCount);
            s.create(
                |s| &mut s.counts,
                count_id,
                InventoryCount::empty(count_id),
                COUNT,
                &CountCommand::CreateCount(CreateCount {
                    count_id,
                    name: name.clone(),
                    store,
                    date,
                    notes,
                    occurred_at: Utc::now(),
                }),
            )?;
            s.sequences.next(SequenceCode::InventoryCount);
            info!(count = %count_id, %name, "inventory count created");
            Ok(count_id)
        })
    }

    /// Snapshot every stock record of the count's store into count lines.
    pub fn start_count(&self, count_id: CountId) -> BackofficeResult<()> {
        self.write(|s| {
            let store = found(&s.counts, &count_id, COUNT)?
                .store()
                .ok_or_else(|| DomainError::invariant("inventory count without store"))?;
            let snapshot: Vec<(Variant, i64)> = s
                .ledger
                .records_for_store(store)
                .map(|r| (r.key.variant(), r.quantity))
                .collect();
            s.execute(
                |s| &mut s.counts,
                &count_id,
                COUNT,
                &CountCommand::Start(StartCount {
                    count_id,
                    snapshot,
                    occurred_at: Utc::now(),
                }),
            )?;
            info!(count = %count_id, "inventory count started");
            Ok(())
        })
    }

    pub fn record_count(
        &self,
        count_id: CountId,
        line_no: u32,
        real_qty: i64,
    ) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.counts,
                &count_id,
                COUNT,
                &CountCommand::RecordCount(RecordCount {
                    count_id,
                    line_no,
                    real_qty,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })
    }

    /// Item found on the shelf without a stock record. Returns the line number.
    pub fn add_count_line(
        &self,
        count_id: CountId,
        variant: Variant,
        real_qty: i64,
    ) -> BackofficeResult<u32> {
        self.write(|s| {
            s.require_variant(&variant)?;
            let events = s.execute(
                |s| &mut s.counts,
                &count_id,
                COUNT,
                &CountCommand::AddLine(AddCountLine {
                    count_id,
                    variant,
                    real_qty,
                    occurred_at: Utc::now(),
                }),
            )?;
            events
                .iter()
                .find_map(|e| match e {
                    CountEvent::CountLineAdded(added) => Some(added.line.line_no),
                    _ => None,
                })
                .ok_or_else(|| DomainError::invariant("count line was not added").into())
        })
    }

    /// Write every counted quantity that differs from the ledger back to it.
    pub fn validate_count(&self, count_id: CountId) -> BackofficeResult<()> {
        self.write(|s| {
            let now = Utc::now();
            let count = found(&s.counts, &count_id, COUNT)?;
            let events = count.handle(&CountCommand::Validate(CountTransition {
                count_id,
                occurred_at: now,
            }))?;
            let counts = count.adjusted_quantities();
            let stock_events = if counts.is_empty() {
                Vec::new()
            } else {
                s.ledger.handle(&StockCommand::SetQuantities(SetQuantities {
                    ledger_id: s.ledger.id_typed(),
                    reference: count.movement_reference(),
                    counts,
                    occurred_at: now,
                }))?
            };

            let mut batch = JournalBatch::new();
            s.stage(&mut batch, count_id, COUNT, &events)?;
            s.stage(&mut batch, s.ledger.id_typed(), LEDGER, &stock_events)?;

            super::apply_to(&mut s.counts, &count_id, &events)?;
            s.ledger.apply_all(&stock_events);
            s.journal.commit(batch);
            info!(count = %count_id, adjusted = stock_events.len(), "inventory count validated");
            Ok(())
        })
    }

    pub fn cancel_count(&self, count_id: CountId) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.counts,
                &count_id,
                COUNT,
                &CountCommand::Cancel(CountTransition {
                    count_id,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })
    }

    pub fn count(&self, count_id: CountId) -> BackofficeResult<Option<InventoryCount>> {
        self.read(|s| s.counts.get(&count_id).cloned())
    }
}
