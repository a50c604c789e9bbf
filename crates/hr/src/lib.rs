//! HR module: employees and their attendance.

pub mod attendance;
pub mod employee;

pub use attendance::{
    Attendance, AttendanceCommand, AttendanceEvent, AttendanceId, CheckIn, CheckOut, CheckedIn,
    CheckedOut,
};
pub use employee::{
    ChangeEmployeeState, Employee, EmployeeCommand, EmployeeDetails, EmployeeEvent, EmployeeId,
    EmployeeRole, EmployeeState, HireEmployee, UpdateEmployee,
};
