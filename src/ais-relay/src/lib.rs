#![deny(warnings)]
#![deny(rust_2018_idioms)]

//! WebSocket relay in front of the AIS feed, plus the tracker that consumes it: the feed
//! client writes live positions into the vessel store and the risk and simulation
//! processors run against the same store.

pub mod error;
pub mod feed;
pub mod models;
pub mod relay;
pub mod settings;
pub mod startup;

pub use error::{Error, Result};
