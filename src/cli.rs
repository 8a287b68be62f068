//! Command line interface for building and querying geo indexes.

pub mod args;
pub mod commands;
pub mod output;
