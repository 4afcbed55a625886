//! Retalk - lip-sync video dubbing front end
//!
//! Turns a typed set of inference parameters into a single invocation of an
//! external lip-sync inference program, runs it, and classifies the outcome.

pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod params;
pub mod progress;
pub mod runner;
pub mod setup;
pub mod workflow;
