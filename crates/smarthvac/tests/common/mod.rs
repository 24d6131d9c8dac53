//! Shared test utilities for smarthvac integration tests.
//!
//! `TestHarness` wires a client context to isolated backends and plays the
//! external job processor: it advances job documents and uploads plots.

pub mod harness;

pub use harness::{wait_for_render, TestHarness};
