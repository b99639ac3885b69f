//! Scenario tests run against the simulated backend

mod common;
mod device_selection;
