//! Check-in / check-out records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tailor_core::{Aggregate, AggregateRoot, DomainError, typed_id};
use tailor_events::Event;

use crate::employee::EmployeeId;

typed_id!(AttendanceId);

/// Aggregate root: Attendance (one shift of one employee).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attendance {
    id: AttendanceId,
    employee: Option<EmployeeId>,
    check_in: Option<DateTime<Utc>>,
    check_out: Option<DateTime<Utc>>,
    notes: Option<String>,
    version: u64,
    created: bool,
}

impl Attendance {
    pub fn empty(id: AttendanceId) -> Self {
        Self {
            id,
            employee: None,
            check_in: None,
            check_out: None,
            notes: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> AttendanceId {
        self.id
    }

    pub fn employee(&self) -> Option<EmployeeId> {
        self.employee
    }

    pub fn check_in(&self) -> Option<DateTime<Utc>> {
        self.check_in
    }

    pub fn check_out(&self) -> Option<DateTime<Utc>> {
        self.check_out
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.created && self.check_out.is_none()
    }

    /// Worked minutes; zero while the shift is still open.
    pub fn worked_minutes(&self) -> i64 {
        match (self.check_in, self.check_out) {
            (Some(start), Some(end)) => (end - start).num_minutes(),
            _ => 0,
        }
    }
}

impl AggregateRoot for Attendance {
    type Id = AttendanceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckIn {
    pub attendance_id: AttendanceId,
    pub employee: EmployeeId,
    pub at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOut {
    pub attendance_id: AttendanceId,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceCommand {
    CheckIn(CheckIn),
    CheckOut(CheckOut),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckedIn {
    pub attendance_id: AttendanceId,
    pub employee: EmployeeId,
    pub at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckedOut {
    pub attendance_id: AttendanceId,
    pub at: DateTime<Utc>,
    pub worked_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceEvent {
    CheckedIn(CheckedIn),
    CheckedOut(CheckedOut),
}

impl Event for AttendanceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AttendanceEvent::CheckedIn(_) => "hr.attendance.checked_in",
            AttendanceEvent::CheckedOut(_) => "hr.attendance.checked_out",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AttendanceEvent::CheckedIn(e) => e.at,
            AttendanceEvent::CheckedOut(e) => e.at,
        }
    }
}

impl Aggregate for Attendance {
    type Command = AttendanceCommand;
    type Event = AttendanceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AttendanceEvent::CheckedIn(e) => {
                self.id = e.attendance_id;
                self.employee = Some(e.employee);
                self.check_in = Some(e.at);
                self.check_out = None;
                self.notes = e.notes.clone();
                self.created = true;
            }
            AttendanceEvent::CheckedOut(e) => {
                self.check_out = Some(e.at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AttendanceCommand::CheckIn(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("attendance already recorded"));
                }
                Ok(vec![AttendanceEvent::CheckedIn(CheckedIn {
                    attendance_id: cmd.attendance_id,
                    employee: cmd.employee,
                    at: cmd.at,
                    notes: cmd.notes.clone(),
                })])
            }
            AttendanceCommand::CheckOut(cmd) => {
                if !self.created {
                    return Err(DomainError::missing(format!(
                        "attendance {}",
                        cmd.attendance_id
                    )));
                }
                if self.id != cmd.attendance_id {
                    return Err(DomainError::invariant("attendance_id mismatch"));
                }
                let Some(check_in) = self.check_in else {
                    return Err(DomainError::invariant("attendance has no check-in"));
                };
                if self.check_out.is_some() {
                    return Err(DomainError::transition("already checked out"));
                }
                if cmd.at < check_in {
                    return Err(DomainError::validation(
                        "check-out cannot be earlier than check-in",
                    ));
                }
                Ok(vec![AttendanceEvent::CheckedOut(CheckedOut {
                    attendance_id: cmd.attendance_id,
                    at: cmd.at,
                    worked_minutes: (cmd.at - check_in).num_minutes(),
                })])
            }
        }
    }
}
