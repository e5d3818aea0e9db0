//! Policy layer for sinkguard.
//!
//! This module provides the TOML policy document types ([`config`]), the
//! compiled immutable policy model ([`model`]) that the decision engine
//! evaluates against, and wholesale policy reload ([`reload`]).

pub mod config;
pub mod model;
pub mod reload;
