//! Integration test suite for taskforge.
//!
//! These tests drive the engine end to end, from task text through
//! analysis, scheduling and aggregation, using scripted workers.
//!
//! # Test Categories
//!
//! - `analysis`: classification, role selection and decomposition properties
//! - `parallel_execution`: dependency gating, same-tier overlap and role capacity
//! - `failure_handling`: fail-soft propagation, policies, timeouts and cancellation
//! - `metrics`: run history, role statistics and the metrics sink
//!
//! # CI Compatibility
//!
//! Workers are in-process fakes; nothing here touches the network.

mod fixtures;

mod failure_handling;
mod parallel_execution;
