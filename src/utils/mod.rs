//! Shared utilities for binaries.

pub mod bootstrap;
