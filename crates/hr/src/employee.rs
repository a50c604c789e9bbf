use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tailor_catalog::StoreId;
use tailor_core::{Aggregate, AggregateRoot, DomainError, Money, Rate, typed_id};
use tailor_events::Event;

typed_id!(EmployeeId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmployeeRole {
    #[default]
    Cashier,
    Manager,
    Owner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmployeeState {
    Active,
    Inactive,
    Suspended,
}

/// Personal details, all optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeDetails {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub national_id: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Aggregate root: Employee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Employee {
    id: EmployeeId,
    code: String,
    name: String,
    store: Option<StoreId>,
    role: EmployeeRole,
    hire_date: Option<NaiveDate>,
    salary: Money,
    commission: Rate,
    state: EmployeeState,
    details: EmployeeDetails,
    version: u64,
    created: bool,
}

impl Employee {
    pub fn empty(id: EmployeeId) -> Self {
        Self {
            id,
            code: String::new(),
            name: String::new(),
            store: None,
            role: EmployeeRole::Cashier,
            hire_date: None,
            salary: Money::ZERO,
            commission: Rate::ZERO,
            state: EmployeeState::Active,
            details: EmployeeDetails::default(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> EmployeeId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> Option<StoreId> {
        self.store
    }

    pub fn role(&self) -> EmployeeRole {
        self.role
    }

    pub fn hire_date(&self) -> Option<NaiveDate> {
        self.hire_date
    }

    pub fn salary(&self) -> Money {
        self.salary
    }

    pub fn commission(&self) -> Rate {
        self.commission
    }

    pub fn state(&self) -> EmployeeState {
        self.state
    }

    pub fn details(&self) -> &EmployeeDetails {
        &self.details
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_active(&self) -> bool {
        self.state == EmployeeState::Active
    }

    /// Commission owed on a sales total.
    pub fn commission_on(&self, sales_total: Money) -> Money {
        self.commission.of(sales_total)
    }
}

impl AggregateRoot for Employee {
    type Id = EmployeeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: HireEmployee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HireEmployee {
    pub employee_id: EmployeeId,
    /// Code from the counter service (e.g. `EMP/00001`).
    pub code: String,
    pub name: String,
    pub store: StoreId,
    pub role: EmployeeRole,
    pub hire_date: NaiveDate,
    pub salary: Money,
    /// Percentage of confirmed sales, 0..=100 %.
    pub commission: Rate,
    pub details: EmployeeDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateEmployee. `None` keeps the current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEmployee {
    pub employee_id: EmployeeId,
    pub name: Option<String>,
    pub store: Option<StoreId>,
    pub role: Option<EmployeeRole>,
    pub salary: Option<Money>,
    pub commission: Option<Rate>,
    pub details: Option<EmployeeDetails>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeEmployeeState.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEmployeeState {
    pub employee_id: EmployeeId,
    pub state: EmployeeState,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmployeeCommand {
    Hire(HireEmployee),
    Update(UpdateEmployee),
    ChangeState(ChangeEmployeeState),
}

/// Event: EmployeeHired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeHired {
    pub employee_id: EmployeeId,
    pub code: String,
    pub name: String,
    pub store: StoreId,
    pub role: EmployeeRole,
    pub hire_date: NaiveDate,
    pub salary: Money,
    pub commission: Rate,
    pub details: EmployeeDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EmployeeUpdated (full replacement of the mutable fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeUpdated {
    pub employee_id: EmployeeId,
    pub name: String,
    pub store: StoreId,
    pub role: EmployeeRole,
    pub salary: Money,
    pub commission: Rate,
    pub details: EmployeeDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EmployeeStateChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeStateChanged {
    pub employee_id: EmployeeId,
    pub state: EmployeeState,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmployeeEvent {
    Hired(EmployeeHired),
    Updated(EmployeeUpdated),
    StateChanged(EmployeeStateChanged),
}

impl Event for EmployeeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            EmployeeEvent::Hired(_) => "hr.employee.hired",
            EmployeeEvent::Updated(_) => "hr.employee.updated",
            EmployeeEvent::StateChanged(_) => "hr.employee.state_changed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            EmployeeEvent::Hired(e) => e.occurred_at,
            EmployeeEvent::Updated(e) => e.occurred_at,
            EmployeeEvent::StateChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Employee {
    type Command = EmployeeCommand;
    type Event = EmployeeEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            EmployeeEvent::Hired(e) => {
                self.id = e.employee_id;
                self.code = e.code.clone();
                self.name = e.name.clone();
                self.store = Some(e.store);
                self.role = e.role;
                self.hire_date = Some(e.hire_date);
                self.salary = e.salary;
                self.commission = e.commission;
                self.details = e.details.clone();
                self.state = EmployeeState::Active;
                self.created = true;
            }
            EmployeeEvent::Updated(e) => {
                self.name = e.name.clone();
                self.store = Some(e.store);
                self.role = e.role;
                self.salary = e.salary;
                self.commission = e.commission;
                self.details = e.details.clone();
            }
            EmployeeEvent::StateChanged(e) => {
                self.state = e.state;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            EmployeeCommand::Hire(cmd) => self.handle_hire(cmd),
            EmployeeCommand::Update(cmd) => self.handle_update(cmd),
            EmployeeCommand::ChangeState(cmd) => self.handle_change_state(cmd),
        }
    }
}

impl Employee {
    fn ensure_created(&self, employee_id: EmployeeId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::missing(format!("employee {employee_id}")));
        }
        if self.id != employee_id {
            return Err(DomainError::invariant("employee_id mismatch"));
        }
        Ok(())
    }

    fn validate_pay(salary: Money, commission: Rate) -> Result<(), DomainError> {
        if salary.is_negative() {
            return Err(DomainError::validation("salary cannot be negative"));
        }
        // Rate is bounded at construction; a deserialized one may not be.
        if commission > Rate::FULL {
            return Err(DomainError::validation(
                "commission rate must be between 0 and 100%",
            ));
        }
        Ok(())
    }

    fn handle_hire(&self, cmd: &HireEmployee) -> Result<Vec<EmployeeEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("employee already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("employee name cannot be empty"));
        }
        Self::validate_pay(cmd.salary, cmd.commission)?;

        Ok(vec![EmployeeEvent::Hired(EmployeeHired {
            employee_id: cmd.employee_id,
            code: cmd.code.clone(),
            name: cmd.name.trim().to_string(),
            store: cmd.store,
            role: cmd.role,
            hire_date: cmd.hire_date,
            salary: cmd.salary,
            commission: cmd.commission,
            details: cmd.details.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateEmployee) -> Result<Vec<EmployeeEvent>, DomainError> {
        self.ensure_created(cmd.employee_id)?;

        let name = cmd.name.clone().unwrap_or_else(|| self.name.clone());
        if name.trim().is_empty() {
            return Err(DomainError::validation("employee name cannot be empty"));
        }
        let salary = cmd.salary.unwrap_or(self.salary);
        let commission = cmd.commission.unwrap_or(self.commission);
        Self::validate_pay(salary, commission)?;
        let store = cmd
            .store
            .or(self.store)
            .ok_or_else(|| DomainError::invariant("employee has no store"))?;

        Ok(vec![EmployeeEvent::Updated(EmployeeUpdated {
            employee_id: cmd.employee_id,
            name: name.trim().to_string(),
            store,
            role: cmd.role.unwrap_or(self.role),
            salary,
            commission,
            details: cmd.details.clone().unwrap_or_else(|| self.details.clone()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_state(
        &self,
        cmd: &ChangeEmployeeState,
    ) -> Result<Vec<EmployeeEvent>, DomainError> {
        self.ensure_created(cmd.employee_id)?;
        if self.state == cmd.state {
            return Err(DomainError::conflict(format!(
                "employee is already {:?}",
                cmd.state
            )));
        }
        Ok(vec![EmployeeEvent::StateChanged(EmployeeStateChanged {
            employee_id: cmd.employee_id,
            state: cmd.state,
            occurred_at: cmd.occurred_at,
        })])
    }
}
