//! Foundation module - logging setup shared by binaries and tests

pub mod logging;
