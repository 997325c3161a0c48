#![deny(warnings)]
#![deny(rust_2018_idioms)]

//! Vessel state shared by the relay, the risk engine and the simulation driver.

mod demo;
mod domain;
pub mod error;
mod geometry;
mod selectors;
mod store;

pub use demo::*;
pub use domain::*;
pub use error::{Error, Result};
pub use geometry::*;
pub use selectors::*;
pub use store::*;
