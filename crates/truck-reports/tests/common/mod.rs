//! Shared test utilities for truck-reports integration tests.
//!
//! This module provides:
//! - `FakeMailbox`, a scripted in-memory mailbox
//! - `TestHarness` wiring the pipeline to a temp database and files directory
//! - `MessageBuilder` for multipart messages with attachments

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::*;
