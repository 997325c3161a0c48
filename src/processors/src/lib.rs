#![deny(warnings)]
#![deny(rust_2018_idioms)]

//! Periodic passes over the vessel store: collision risk, geofencing and the synthetic
//! fleet simulation.

mod risk;
mod simulation;

pub use risk::*;
pub use simulation::*;
