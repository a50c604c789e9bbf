use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tailor_catalog::StoreId;
use tailor_core::{Aggregate, AggregateRoot, DomainError, typed_id};
use tailor_events::Event;

use crate::ledger::{MovementReference, MovementSource, StockKey, Variant};

typed_id!(
    /// Physical inventory count identifier.
    CountId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountStatus {
    Draft,
    InProgress,
    Done,
    Cancel,
}

/// One counted item: what the ledger said versus what is on the shelf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountLine {
    pub line_no: u32,
    pub variant: Variant,
    pub theoretical_qty: i64,
    pub real_qty: i64,
}

impl CountLine {
    pub fn difference(&self) -> i64 {
        self.real_qty - self.theoretical_qty
    }
}

/// Aggregate root: InventoryCount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryCount {
    id: CountId,
    name: String,
    store: Option<StoreId>,
    date: Option<NaiveDate>,
    notes: Option<String>,
    status: CountStatus,
    lines: Vec<CountLine>,
    version: u64,
    created: bool,
}

impl InventoryCount {
    pub fn empty(id: CountId) -> Self {
        Self {
            id,
            name: String::new(),
            store: None,
            date: None,
            notes: None,
            status: CountStatus::Draft,
            lines: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CountId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> Option<StoreId> {
        self.store
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn status(&self) -> CountStatus {
        self.status
    }

    pub fn lines(&self) -> &[CountLine] {
        &self.lines
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn difference_count(&self) -> usize {
        self.lines.iter().filter(|l| l.difference() != 0).count()
    }

    /// Absolute quantities to write back on validation (differing lines only).
    pub fn adjusted_quantities(&self) -> Vec<(StockKey, i64)> {
        let Some(store) = self.store else {
            return Vec::new();
        };
        self.lines
            .iter()
            .filter(|l| l.difference() != 0)
            .map(|l| (l.variant.at(store), l.real_qty))
            .collect()
    }

    pub fn movement_reference(&self) -> MovementReference {
        MovementReference::new(MovementSource::InventoryCount, self.name.clone())
    }
}

impl AggregateRoot for InventoryCount {
    type Id = CountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateCount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCount {
    pub count_id: CountId,
    pub name: String,
    pub store: StoreId,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartCount. `snapshot` is the store's ledger at start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartCount {
    pub count_id: CountId,
    pub snapshot: Vec<(Variant, i64)>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordCount (shelf quantity for an existing line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCount {
    pub count_id: CountId,
    pub line_no: u32,
    pub real_qty: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddCountLine (item found on the shelf but absent from the ledger).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddCountLine {
    pub count_id: CountId,
    pub variant: Variant,
    pub real_qty: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountTransition {
    pub count_id: CountId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountCommand {
    CreateCount(CreateCount),
    Start(StartCount),
    RecordCount(RecordCount),
    AddLine(AddCountLine),
    Validate(CountTransition),
    Cancel(CountTransition),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountCreated {
    pub count_id: CountId,
    pub name: String,
    pub store: StoreId,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountStarted {
    pub count_id: CountId,
    pub lines: Vec<CountLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRecorded {
    pub count_id: CountId,
    pub line_no: u32,
    pub real_qty: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountLineAdded {
    pub count_id: CountId,
    pub line: CountLine,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountValidated {
    pub count_id: CountId,
    pub difference_count: usize,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountCancelled {
    pub count_id: CountId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountEvent {
    CountCreated(CountCreated),
    CountStarted(CountStarted),
    CountRecorded(CountRecorded),
    CountLineAdded(CountLineAdded),
    CountValidated(CountValidated),
    CountCancelled(CountCancelled),
}

impl Event for CountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CountEvent::CountCreated(_) => "stock.count.created",
            CountEvent::CountStarted(_) => "stock.count.started",
            CountEvent::CountRecorded(_) => "stock.count.recorded",
            CountEvent::CountLineAdded(_) => "stock.count.line_added",
            CountEvent::CountValidated(_) => "stock.count.validated",
            CountEvent::CountCancelled(_) => "stock.count.cancelled",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CountEvent::CountCreated(e) => e.occurred_at,
            CountEvent::CountStarted(e) => e.occurred_at,
            CountEvent::CountRecorded(e) => e.occurred_at,
            CountEvent::CountLineAdded(e) => e.occurred_at,
            CountEvent::CountValidated(e) => e.occurred_at,
            CountEvent::CountCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InventoryCount {
    type Command = CountCommand;
    type Event = CountEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CountEvent::CountCreated(e) => {
                self.id = e.count_id;
                self.name = e.name.clone();
                self.store = Some(e.store);
                self.date = Some(e.date);
                self.notes = e.notes.clone();
                self.status = CountStatus::Draft;
                self.lines.clear();
                self.created = true;
            }
            CountEvent::CountStarted(e) => {
                self.lines = e.lines.clone();
                self.status = CountStatus::InProgress;
            }
            CountEvent::CountRecorded(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == e.line_no) {
                    line.real_qty = e.real_qty;
                }
            }
            CountEvent::CountLineAdded(e) => {
                self.lines.push(e.line.clone());
            }
            CountEvent::CountValidated(_) => {
                self.status = CountStatus::Done;
            }
            CountEvent::CountCancelled(_) => {
                self.status = CountStatus::Cancel;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CountCommand::CreateCount(cmd) => self.handle_create(cmd),
            CountCommand::Start(cmd) => self.handle_start(cmd),
            CountCommand::RecordCount(cmd) => self.handle_record(cmd),
            CountCommand::AddLine(cmd) => self.handle_add_line(cmd),
            CountCommand::Validate(cmd) => self.handle_validate(cmd),
            CountCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl InventoryCount {
    fn ensure_created(&self, count_id: CountId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::missing(format!("inventory count {count_id}")));
        }
        if self.id != count_id {
            return Err(DomainError::invariant("count_id mismatch"));
        }
        Ok(())
    }

    fn ensure_in_progress(&self) -> Result<(), DomainError> {
        if self.status != CountStatus::InProgress {
            return Err(DomainError::transition(format!(
                "inventory count {} is not in progress",
                self.name
            )));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateCount) -> Result<Vec<CountEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("inventory count already exists"));
        }
        Ok(vec![CountEvent::CountCreated(CountCreated {
            count_id: cmd.count_id,
            name: cmd.name.clone(),
            store: cmd.store,
            date: cmd.date,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start(&self, cmd: &StartCount) -> Result<Vec<CountEvent>, DomainError> {
        self.ensure_created(cmd.count_id)?;
        if self.status != CountStatus::Draft {
            return Err(DomainError::transition("only draft counts can be started"));
        }

        let lines = cmd
            .snapshot
            .iter()
            .zip(1u32..)
            .map(|((variant, qty), line_no)| CountLine {
                line_no,
                variant: *variant,
                theoretical_qty: *qty,
                real_qty: *qty,
            })
            .collect();

        Ok(vec![CountEvent::CountStarted(CountStarted {
            count_id: cmd.count_id,
            lines,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record(&self, cmd: &RecordCount) -> Result<Vec<CountEvent>, DomainError> {
        self.ensure_created(cmd.count_id)?;
        self.ensure_in_progress()?;
        if cmd.real_qty < 0 {
            return Err(DomainError::validation("counted quantity cannot be negative"));
        }
        if !self.lines.iter().any(|l| l.line_no == cmd.line_no) {
            return Err(DomainError::missing(format!("count line {}", cmd.line_no)));
        }
        Ok(vec![CountEvent::CountRecorded(CountRecorded {
            count_id: cmd.count_id,
            line_no: cmd.line_no,
            real_qty: cmd.real_qty,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddCountLine) -> Result<Vec<CountEvent>, DomainError> {
        self.ensure_created(cmd.count_id)?;
        self.ensure_in_progress()?;
        if cmd.real_qty < 0 {
            return Err(DomainError::validation("counted quantity cannot be negative"));
        }
        if self.lines.iter().any(|l| l.variant == cmd.variant) {
            return Err(DomainError::conflict(
                "item is already part of this count; record its quantity instead",
            ));
        }
        let line_no = self.lines.iter().map(|l| l.line_no).max().unwrap_or(0) + 1;
        Ok(vec![CountEvent::CountLineAdded(CountLineAdded {
            count_id: cmd.count_id,
            line: CountLine {
                line_no,
                variant: cmd.variant,
                theoretical_qty: 0,
                real_qty: cmd.real_qty,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_validate(&self, cmd: &CountTransition) -> Result<Vec<CountEvent>, DomainError> {
        self.ensure_created(cmd.count_id)?;
        self.ensure_in_progress()?;
        if self.lines.is_empty() {
            return Err(DomainError::validation("cannot validate a count without lines"));
        }
        Ok(vec![CountEvent::CountValidated(CountValidated {
            count_id: cmd.count_id,
            difference_count: self.difference_count(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CountTransition) -> Result<Vec<CountEvent>, DomainError> {
        self.ensure_created(cmd.count_id)?;
        match self.status {
            CountStatus::Done => Err(DomainError::transition(
                "a completed inventory count cannot be cancelled",
            )),
            CountStatus::Cancel => {
                Err(DomainError::transition("inventory count is already cancelled"))
            }
            CountStatus::Draft | CountStatus::InProgress => {
                Ok(vec![CountEvent::CountCancelled(CountCancelled {
                    count_id: cmd.count_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}
