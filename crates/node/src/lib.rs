//! Runner of chordsim simulations.
//! --------------
//! - [config] reads the YAML description of a run.
//! - [driver] makes nodes join, leave, crash and look up keys on the virtual clock.
//! - [report] exports one CSV row per lookup.
pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod report;
pub mod util;
