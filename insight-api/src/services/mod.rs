//! Service Layer
//!
//! The analysis orchestrator and the keyed lock it serializes pipelines with.

mod analysis_service;
mod single_flight;

pub use analysis_service::*;
pub use single_flight::{FlightGuard, SingleFlight};
