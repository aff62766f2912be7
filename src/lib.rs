//! subtrans - batch subtitle translation
//!
//! Translates the text of SRT-style subtitle files with an LLM provider,
//! one block at a time, while keeping every index and timing line intact.
//! Blocks that cannot be translated keep their original text.

pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod subtitle;
pub mod translate;
pub mod workflow;
