//! # Tether Server
//!
//! Command-line front end for the Tether dispatcher.

#![warn(missing_docs)]

/// Command-line flags and configuration resolution
pub mod cli;

/// Interactive operator console
pub mod console;
