//! Domain models for the turnos system.

mod patient;
mod session;

pub use patient::*;
pub use session::*;
