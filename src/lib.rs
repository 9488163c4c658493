//! Prompt an LLM with every method of a Java or Python project.
//!
//! The pipeline is: analyse the project ([`analysis`]), turn each focal method
//! into an instruction ([`prompt`], [`tasks`]), send it to a backend
//! ([`dispatch`], [`backend`]), pull the answer out of the reply ([`extract`])
//! and show it ([`display`]). [`pipeline`] drives the loop.

pub mod analysis;
pub mod backend;
pub mod config;
pub mod dispatch;
pub mod display;
pub mod error;
pub mod extract;
pub mod file_resolver;
pub mod pipeline;
pub mod prompt;
pub mod sanitizer;
pub mod symbol_extractor;
pub mod tasks;
pub mod types;
