use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tailor_catalog::{ColorId, ProductId, SizeId, StoreId};
use tailor_core::{Aggregate, AggregateRoot, DomainError, typed_id};
use tailor_events::Event;

typed_id!(
    /// Identifier of the stock ledger (one per back office).
    LedgerId
);

/// Threshold used for records created without an explicit minimum.
pub const DEFAULT_MIN_QUANTITY: i64 = 10;

/// A sellable variant: product in a given size and color.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Variant {
    pub product: ProductId,
    pub size: SizeId,
    pub color: ColorId,
}

impl Variant {
    pub fn new(product: ProductId, size: SizeId, color: ColorId) -> Self {
        Self {
            product,
            size,
            color,
        }
    }

    pub fn at(self, store: StoreId) -> StockKey {
        StockKey {
            store,
            product: self.product,
            size: self.size,
            color: self.color,
        }
    }
}

/// Unique key of a stock record: (store, product, size, color).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub store: StoreId,
    pub product: ProductId,
    pub size: SizeId,
    pub color: ColorId,
}

impl StockKey {
    pub fn new(store: StoreId, product: ProductId, size: SizeId, color: ColorId) -> Self {
        Self {
            store,
            product,
            size,
            color,
        }
    }

    pub fn variant(&self) -> Variant {
        Variant::new(self.product, self.size, self.color)
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "product {} size {} color {} at store {}",
            self.product, self.size, self.color, self.store
        )
    }
}

/// Derived availability of a stock record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockState {
    Available,
    Low,
    Out,
}

impl StockState {
    /// out if ≤ 0, low if ≤ the minimum, else available.
    pub fn classify(quantity: i64, min_quantity: i64) -> Self {
        if quantity <= 0 {
            StockState::Out
        } else if quantity <= min_quantity {
            StockState::Low
        } else {
            StockState::Available
        }
    }
}

/// Quantity on hand for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub key: StockKey,
    pub quantity: i64,
    pub min_quantity: i64,
    pub state: StockState,
}

impl StockRecord {
    fn new(key: StockKey, min_quantity: i64) -> Self {
        Self {
            key,
            quantity: 0,
            min_quantity,
            state: StockState::Out,
        }
    }

    fn recompute_state(&mut self) {
        self.state = StockState::classify(self.quantity, self.min_quantity);
    }
}

/// Which document caused a stock change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementSource {
    Sale,
    SaleCancellation,
    Purchase,
    PurchaseCancellation,
    TransferOut,
    TransferIn,
    TransferCancellation,
    Return,
    InventoryCount,
    Manual,
}

/// Document reference carried by every ledger event (name from the counter service).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovementReference {
    pub source: MovementSource,
    pub document: String,
}

impl MovementReference {
    pub fn new(source: MovementSource, document: impl Into<String>) -> Self {
        Self {
            source,
            document: document.into(),
        }
    }
}

/// A signed quantity change for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub key: StockKey,
    pub delta: i64,
}

impl StockMovement {
    pub fn new(key: StockKey, delta: i64) -> Self {
        Self { key, delta }
    }

    pub fn outbound(key: StockKey, quantity: i64) -> Self {
        Self::new(key, -quantity)
    }

    pub fn inbound(key: StockKey, quantity: i64) -> Self {
        Self::new(key, quantity)
    }
}

/// Aggregate root: StockLedger.
///
/// Holds every stock record of every store so that a document touching many
/// keys is validated and applied as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLedger {
    id: LedgerId,
    records: BTreeMap<StockKey, StockRecord>,
    default_min_quantity: i64,
    version: u64,
}

impl StockLedger {
    pub fn new(id: LedgerId, default_min_quantity: i64) -> Self {
        Self {
            id,
            records: BTreeMap::new(),
            default_min_quantity: default_min_quantity.max(0),
            version: 0,
        }
    }

    pub fn id_typed(&self) -> LedgerId {
        self.id
    }

    pub fn default_min_quantity(&self) -> i64 {
        self.default_min_quantity
    }

    pub fn record(&self, key: &StockKey) -> Option<&StockRecord> {
        self.records.get(key)
    }

    /// Quantity on hand; an absent record counts as zero.
    pub fn available(&self, key: &StockKey) -> i64 {
        self.records.get(key).map(|r| r.quantity).unwrap_or(0)
    }

    pub fn records(&self) -> impl Iterator<Item = &StockRecord> {
        self.records.values()
    }

    pub fn records_for_store(&self, store: StoreId) -> impl Iterator<Item = &StockRecord> {
        self.records.values().filter(move |r| r.key.store == store)
    }

    /// Sum over all sizes and colors of one product at one store.
    pub fn product_total(&self, store: StoreId, product: ProductId) -> i64 {
        self.records_for_store(store)
            .filter(|r| r.key.product == product)
            .map(|r| r.quantity)
            .sum()
    }

    pub fn count_in_state(&self, state: StockState) -> usize {
        self.records.values().filter(|r| r.state == state).count()
    }
}

impl AggregateRoot for StockLedger {
    type Id = LedgerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ApplyMovements (all-or-nothing batch of deltas).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyMovements {
    pub ledger_id: LedgerId,
    pub reference: MovementReference,
    pub movements: Vec<StockMovement>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetQuantities (absolute quantities from a physical count).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetQuantities {
    pub ledger_id: LedgerId,
    pub reference: MovementReference,
    pub counts: Vec<(StockKey, i64)>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetMinQuantity for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetMinQuantity {
    pub ledger_id: LedgerId,
    pub key: StockKey,
    pub min_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetDefaultMinQuantity for records created from now on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDefaultMinQuantity {
    pub ledger_id: LedgerId,
    pub min_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    ApplyMovements(ApplyMovements),
    SetQuantities(SetQuantities),
    SetMinQuantity(SetMinQuantity),
    SetDefaultMinQuantity(SetDefaultMinQuantity),
}

/// Event: StockMoved. `movements` are netted per key, zero nets dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMoved {
    pub ledger_id: LedgerId,
    pub reference: MovementReference,
    pub movements: Vec<StockMovement>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockCounted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCounted {
    pub ledger_id: LedgerId,
    pub reference: MovementReference,
    pub counts: Vec<(StockKey, i64)>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MinQuantityChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinQuantityChanged {
    pub ledger_id: LedgerId,
    pub key: StockKey,
    pub min_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DefaultMinQuantityChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultMinQuantityChanged {
    pub ledger_id: LedgerId,
    pub min_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    StockMoved(StockMoved),
    StockCounted(StockCounted),
    MinQuantityChanged(MinQuantityChanged),
    DefaultMinQuantityChanged(DefaultMinQuantityChanged),
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::StockMoved(_) => "stock.ledger.moved",
            StockEvent::StockCounted(_) => "stock.ledger.counted",
            StockEvent::MinQuantityChanged(_) => "stock.ledger.min_quantity_changed",
            StockEvent::DefaultMinQuantityChanged(_) => "stock.ledger.default_min_quantity_changed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::StockMoved(e) => e.occurred_at,
            StockEvent::StockCounted(e) => e.occurred_at,
            StockEvent::MinQuantityChanged(e) => e.occurred_at,
            StockEvent::DefaultMinQuantityChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockLedger {
    type Command = StockCommand;
    type Event = StockEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockEvent::StockMoved(e) => {
                for movement in &e.movements {
                    let default_min = self.default_min_quantity;
                    let record = self
                        .records
                        .entry(movement.key)
                        .or_insert_with(|| StockRecord::new(movement.key, default_min));
                    record.quantity += movement.delta;
                    record.recompute_state();
                }
            }
            StockEvent::StockCounted(e) => {
                for (key, quantity) in &e.counts {
                    let default_min = self.default_min_quantity;
                    let record = self
                        .records
                        .entry(*key)
                        .or_insert_with(|| StockRecord::new(*key, default_min));
                    record.quantity = *quantity;
                    record.recompute_state();
                }
            }
            StockEvent::MinQuantityChanged(e) => {
                if let Some(record) = self.records.get_mut(&e.key) {
                    record.min_quantity = e.min_quantity;
                    record.recompute_state();
                }
            }
            StockEvent::DefaultMinQuantityChanged(e) => {
                self.default_min_quantity = e.min_quantity;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockCommand::ApplyMovements(cmd) => self.handle_movements(cmd),
            StockCommand::SetQuantities(cmd) => self.handle_set_quantities(cmd),
            StockCommand::SetMinQuantity(cmd) => self.handle_set_min(cmd),
            StockCommand::SetDefaultMinQuantity(cmd) => self.handle_set_default_min(cmd),
        }
    }
}

fn overflow(key: &StockKey) -> DomainError {
    DomainError::invariant(format!("stock quantity overflow for {key}"))
}

impl StockLedger {
    fn ensure_ledger_id(&self, ledger_id: LedgerId) -> Result<(), DomainError> {
        if self.id != ledger_id {
            return Err(DomainError::invariant("ledger_id mismatch"));
        }
        Ok(())
    }

    fn handle_movements(&self, cmd: &ApplyMovements) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_ledger_id(cmd.ledger_id)?;

        if cmd.movements.is_empty() {
            return Err(DomainError::validation("stock movement batch is empty"));
        }

        // Net per key first so a batch that takes and gives back the same
        // item is judged on its final quantity.
        let mut net: BTreeMap<StockKey, i64> = BTreeMap::new();
        for movement in &cmd.movements {
            if movement.delta == 0 {
                return Err(DomainError::validation("stock delta cannot be zero"));
            }
            let entry = net.entry(movement.key).or_insert(0);
            *entry = entry
                .checked_add(movement.delta)
                .ok_or_else(|| overflow(&movement.key))?;
        }

        for (key, delta) in &net {
            let available = self.available(key);
            let after = available.checked_add(*delta).ok_or_else(|| overflow(key))?;
            if after < 0 {
                return Err(DomainError::insufficient_stock(
                    key.to_string(),
                    available,
                    -delta,
                ));
            }
        }

        let movements: Vec<StockMovement> = net
            .into_iter()
            .filter(|(_, delta)| *delta != 0)
            .map(|(key, delta)| StockMovement::new(key, delta))
            .collect();

        if movements.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![StockEvent::StockMoved(StockMoved {
            ledger_id: cmd.ledger_id,
            reference: cmd.reference.clone(),
            movements,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_quantities(
        &self,
        cmd: &SetQuantities,
    ) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_ledger_id(cmd.ledger_id)?;

        let mut seen = BTreeMap::new();
        for (key, quantity) in &cmd.counts {
            if *quantity < 0 {
                return Err(DomainError::validation(format!(
                    "counted quantity cannot be negative for {key}"
                )));
            }
            if seen.insert(*key, *quantity).is_some() {
                return Err(DomainError::conflict(format!("{key} counted twice")));
            }
        }

        let counts: Vec<(StockKey, i64)> = seen
            .into_iter()
            .filter(|(key, quantity)| self.available(key) != *quantity)
            .collect();

        if counts.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![StockEvent::StockCounted(StockCounted {
            ledger_id: cmd.ledger_id,
            reference: cmd.reference.clone(),
            counts,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_min(&self, cmd: &SetMinQuantity) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_ledger_id(cmd.ledger_id)?;
        if cmd.min_quantity < 0 {
            return Err(DomainError::validation("minimum quantity cannot be negative"));
        }
        if !self.records.contains_key(&cmd.key) {
            return Err(DomainError::missing(format!("stock record for {}", cmd.key)));
        }
        Ok(vec![StockEvent::MinQuantityChanged(MinQuantityChanged {
            ledger_id: cmd.ledger_id,
            key: cmd.key,
            min_quantity: cmd.min_quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_default_min(
        &self,
        cmd: &SetDefaultMinQuantity,
    ) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_ledger_id(cmd.ledger_id)?;
        if cmd.min_quantity < 0 {
            return Err(DomainError::validation("minimum quantity cannot be negative"));
        }
        Ok(vec![StockEvent::DefaultMinQuantityChanged(DefaultMinQuantityChanged {
            ledger_id: cmd.ledger_id,
            min_quantity: cmd.min_quantity,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key() -> StockKey {
        StockKey::new(
            StoreId::generate(),
            ProductId::generate(),
            SizeId::generate(),
            ColorId::generate(),
        )
    }

    fn reference() -> MovementReference {
        MovementReference::new(MovementSource::Manual, "TEST")
    }

    fn move_stock(
        ledger: &mut StockLedger,
        movements: Vec<StockMovement>,
    ) -> Result<(), DomainError> {
        let events = ledger.handle(&StockCommand::ApplyMovements(ApplyMovements {
            ledger_id: ledger.id_typed(),
            reference: reference(),
            movements,
            occurred_at: Utc::now(),
        }))?;
        ledger.apply_all(&events);
        Ok(())
    }

    #[test]
    fn positive_delta_creates_missing_record() {
        let mut ledger = StockLedger::new(LedgerId::generate(), 2);
        let k = key();
        move_stock(&mut ledger, vec![StockMovement::inbound(k, 5)]).unwrap();

        let record = ledger.record(&k).unwrap();
        assert_eq!(record.quantity, 5);
        assert_eq!(record.min_quantity, 2);
        assert_eq!(record.state, StockState::Available);
    }

    #[test]
    fn quantity_overflow_is_rejected_without_change() {
        let mut ledger = StockLedger::new(LedgerId::generate(), 2);
        let k = key();
        move_stock(&mut ledger, vec![StockMovement::inbound(k, i64::MAX)]).unwrap();

        let err = move_stock(&mut ledger, vec![StockMovement::inbound(k, 1)]).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(ledger.available(&k), i64::MAX);

        let other = key();
        let err = move_stock(
            &mut ledger,
            vec![StockMovement::inbound(other, i64::MAX), StockMovement::inbound(other, 1)],
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert!(ledger.record(&other).is_none());
    }

    #[test]
    fn negative_delta_on_missing_record_is_insufficient() {
        let ledger = StockLedger::new(LedgerId::generate(), DEFAULT_MIN_QUANTITY);
        let err = ledger
            .handle(&StockCommand::ApplyMovements(ApplyMovements {
                ledger_id: ledger.id_typed(),
                reference: reference(),
                movements: vec![StockMovement::outbound(key(), 1)],
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        match err {
            DomainError::InsufficientStock {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 0);
                assert_eq!(requested, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn selling_everything_marks_record_out_then_rejects_more() {
        let mut ledger = StockLedger::new(LedgerId::generate(), DEFAULT_MIN_QUANTITY);
        let k = key();
        move_stock(&mut ledger, vec![StockMovement::inbound(k, 5)]).unwrap();
        assert_eq!(ledger.record(&k).unwrap().state, StockState::Low);

        move_stock(&mut ledger, vec![StockMovement::outbound(k, 5)]).unwrap();
        let record = ledger.record(&k).unwrap();
        assert_eq!(record.quantity, 0);
        assert_eq!(record.state, StockState::Out);

        let err = move_stock(&mut ledger, vec![StockMovement::outbound(k, 1)]).unwrap_err();
        assert!(err.is_insufficient_stock());
        assert_eq!(ledger.available(&k), 0);
    }

    #[test]
    fn failing_line_leaves_every_other_line_untouched() {
        let mut ledger = StockLedger::new(LedgerId::generate(), DEFAULT_MIN_QUANTITY);
        let (a, b) = (key(), key());
        move_stock(
            &mut ledger,
            vec![StockMovement::inbound(a, 3), StockMovement::inbound(b, 1)],
        )
        .unwrap();
        let before = ledger.clone();

        let err = move_stock(
            &mut ledger,
            vec![StockMovement::outbound(a, 2), StockMovement::outbound(b, 2)],
        )
        .unwrap_err();
        assert!(err.is_insufficient_stock());
        assert_eq!(ledger, before);
    }

    #[test]
    fn deltas_for_one_key_are_netted() {
        let mut ledger = StockLedger::new(LedgerId::generate(), DEFAULT_MIN_QUANTITY);
        let k = key();
        move_stock(&mut ledger, vec![StockMovement::inbound(k, 1)]).unwrap();

        // -3 then +2 on a record holding 1 nets to 0.
        move_stock(
            &mut ledger,
            vec![StockMovement::outbound(k, 3), StockMovement::inbound(k, 2)],
        )
        .unwrap();
        assert_eq!(ledger.available(&k), 0);
    }

    #[test]
    fn zero_delta_is_rejected() {
        let mut ledger = StockLedger::new(LedgerId::generate(), DEFAULT_MIN_QUANTITY);
        let err = move_stock(&mut ledger, vec![StockMovement::new(key(), 0)]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn min_quantity_change_recomputes_state() {
        let mut ledger = StockLedger::new(LedgerId::generate(), DEFAULT_MIN_QUANTITY);
        let k = key();
        move_stock(&mut ledger, vec![StockMovement::inbound(k, 4)]).unwrap();
        assert_eq!(ledger.record(&k).unwrap().state, StockState::Low);

        let events = ledger
            .handle(&StockCommand::SetMinQuantity(SetMinQuantity {
                ledger_id: ledger.id_typed(),
                key: k,
                min_quantity: 3,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        ledger.apply_all(&events);
        assert_eq!(ledger.record(&k).unwrap().state, StockState::Available);
    }

    #[test]
    fn set_quantities_skips_unchanged_and_rejects_negative() {
        let mut ledger = StockLedger::new(LedgerId::generate(), DEFAULT_MIN_QUANTITY);
        let (a, b) = (key(), key());
        move_stock(&mut ledger, vec![StockMovement::inbound(a, 7)]).unwrap();

        let events = ledger
            .handle(&StockCommand::SetQuantities(SetQuantities {
                ledger_id: ledger.id_typed(),
                reference: MovementReference::new(MovementSource::InventoryCount, "INV/00001"),
                counts: vec![(a, 7), (b, 2)],
                occurred_at: Utc::now(),
            }))
            .unwrap();
        match &events[..] {
            [StockEvent::StockCounted(e)] => assert_eq!(e.counts, vec![(b, 2)]),
            other => panic!("unexpected events: {other:?}"),
        }
        ledger.apply_all(&events);
        assert_eq!(ledger.available(&b), 2);

        let err = ledger
            .handle(&StockCommand::SetQuantities(SetQuantities {
                ledger_id: ledger.id_typed(),
                reference: reference(),
                counts: vec![(a, -1)],
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn state_classification_boundaries() {
        assert_eq!(StockState::classify(0, 10), StockState::Out);
        assert_eq!(StockState::classify(-1, 10), StockState::Out);
        assert_eq!(StockState::classify(10, 10), StockState::Low);
        assert_eq!(StockState::classify(11, 10), StockState::Available);
        assert_eq!(StockState::classify(1, 0), StockState::Available);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of batches is attempted, accepted ones
        /// never leave a negative quantity and rejected ones change nothing.
        #[test]
        fn quantities_never_go_negative(
            batches in prop::collection::vec(
                prop::collection::vec((0usize..4, -20i64..20), 1..6),
                1..40,
            )
        ) {
            let keys: Vec<StockKey> = (0..4).map(|_| key()).collect();
            let mut ledger = StockLedger::new(LedgerId::generate(), DEFAULT_MIN_QUANTITY);

            for batch in batches {
                let movements: Vec<StockMovement> = batch
                    .into_iter()
                    .filter(|(_, d)| *d != 0)
                    .map(|(i, d)| StockMovement::new(keys[i], d))
                    .collect();
                if movements.is_empty() {
                    continue;
                }
                let before = ledger.clone();
                if move_stock(&mut ledger, movements).is_err() {
                    prop_assert_eq!(&ledger, &before);
                }
                for record in ledger.records() {
                    prop_assert!(record.quantity >= 0);
                    prop_assert_eq!(
                        record.state,
                        StockState::classify(record.quantity, record.min_quantity)
                    );
                }
            }
        }
    }
}
