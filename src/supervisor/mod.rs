//! Supervisor core: lifecycle state, session log, child process
//! management, the log-tailing network watchdog, and the command
//! dispatcher that coordinates them.

pub mod child;
pub mod dispatcher;
pub mod session_log;
pub mod state_machine;
pub mod watchdog;
