use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use tailor_catalog::StoreId;
use tailor_core::{DomainError, Money, Rate};
use tailor_hr::{
    Attendance, AttendanceCommand, AttendanceId, ChangeEmployeeState, CheckIn, CheckOut,
    Employee, EmployeeCommand, EmployeeDetails, EmployeeId, EmployeeRole, EmployeeState,
    HireEmployee, UpdateEmployee,
};

use super::{ATTENDANCE, Backoffice, EMPLOYEE};
use crate::error::BackofficeResult;
use crate::repository::Repository;
use crate::sequence::SequenceCode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEmployee {
    pub name: String,
    pub store: StoreId,
    pub role: EmployeeRole,
    pub hire_date: NaiveDate,
    pub salary: Money,
    pub commission: Rate,
    pub details: EmployeeDetails,
}

/// Fields left `None` keep their current value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmployeeUpdate {
    pub name: Option<String>,
    pub store: Option<StoreId>,
    pub role: Option<EmployeeRole>,
    pub salary: Option<Money>,
    pub commission: Option<Rate>,
    pub details: Option<EmployeeDetails>,
}

impl Backoffice {
    pub fn hire_employee(&self, employee: NewEmployee) -> BackofficeResult<EmployeeId> {
        self.write(|s| {
            s.require_store(employee.store)?;

            let employee_id = EmployeeId::generate();
            let code = s.sequences.peek(SequenceCode::Employee);
            s.create(
                |s| &mut s.employees,
                employee_id,
                Employee::empty(employee_id),
                EMPLOYEE,
                &EmployeeCommand::Hire(HireEmployee {
                    employee_id,
                    code: code.clone(),
                    name: employee.name,
                    store: employee.store,
                    role: employee.role,
                    hire_date: employee.hire_date,
                    salary: employee.salary,
                    commission: employee.commission,
                    details: employee.details,
                    occurred_at: Utc::now(),
                }),
            )?;
            s.sequences.next(SequenceCode::Employee);
            info!(employee = %employee_id, %code, "employee hired");
            Ok(employee_id)
        })
    }

    pub fn update_employee(
        &self,
        employee_id: EmployeeId,
        update: EmployeeUpdate,
    ) -> BackofficeResult<()> {
        self.write(|s| {
            if let Some(store) = update.store {
                s.require_store(store)?;
            }
            s.execute(
                |s| &mut s.employees,
                &employee_id,
                EMPLOYEE,
                &EmployeeCommand::Update(UpdateEmployee {
                    employee_id,
                    name: update.name,
                    store: update.store,
                    role: update.role,
                    salary: update.salary,
                    commission: update.commission,
                    details: update.details,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })
    }

    pub fn change_employee_state(
        &self,
        employee_id: EmployeeId,
        state: EmployeeState,
    ) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.employees,
                &employee_id,
                EMPLOYEE,
                &EmployeeCommand::ChangeState(ChangeEmployeeState {
                    employee_id,
                    state,
                    occurred_at: Utc::now(),
                }),
            )?;
            info!(employee = %employee_id, ?state, "employee state changed");
            Ok(())
        })
    }

    pub fn employee(&self, employee_id: EmployeeId) -> BackofficeResult<Option<Employee>> {
        self.read(|s| s.employees.get(&employee_id).cloned())
    }

    pub fn employees(&self) -> BackofficeResult<Vec<Employee>> {
        self.read(|s| s.employees.values().cloned().collect())
    }

    /// Start a shift. An employee has at most one open attendance.
    pub fn check_in(
        &self,
        employee_id: EmployeeId,
        at: DateTime<Utc>,
        notes: Option<String>,
    ) -> BackofficeResult<AttendanceId> {
        self.write(|s| {
            let employee = s.require_employee(employee_id)?;
            if !employee.is_active() {
                return Err(DomainError::invariant(format!(
                    "employee {} is not active",
                    employee.name()
                ))
                .into());
            }
            if s
                .attendances
                .values()
                .any(|a| a.employee() == Some(employee_id) && a.is_open())
            {
                return Err(DomainError::conflict(format!(
                    "employee {} is already checked in",
                    employee.name()
                ))
                .into());
            }

            let attendance_id = AttendanceId::generate();
            s.create(
                |s| &mut s.attendances,
                attendance_id,
                Attendance::empty(attendance_id),
                ATTENDANCE,
                &AttendanceCommand::CheckIn(CheckIn {
                    attendance_id,
                    employee: employee_id,
                    at,
                    notes,
                }),
            )?;
            Ok(attendance_id)
        })
    }

    pub fn check_out(
        &self,
        attendance_id: AttendanceId,
        at: DateTime<Utc>,
    ) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.attendances,
                &attendance_id,
                ATTENDANCE,
                &AttendanceCommand::CheckOut(CheckOut { attendance_id, at }),
            )?;
            Ok(())
        })
    }

    pub fn attendance(&self, attendance_id: AttendanceId) -> BackofficeResult<Option<Attendance>> {
        self.read(|s| s.attendances.get(&attendance_id).cloned())
    }

    pub fn attendances_for(&self, employee_id: EmployeeId) -> BackofficeResult<Vec<Attendance>> {
        self.read(|s| {
            s.attendances
                .values()
                .filter(|a| a.employee() == Some(employee_id))
                .cloned()
                .collect()
        })
    }
}
