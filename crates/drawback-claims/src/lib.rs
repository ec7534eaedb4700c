//! Duty drawback claim workflow: wizard state machine, document completeness, claim
//! assembly and the collaborator backends it drives.

pub mod backends;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
