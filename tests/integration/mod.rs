//! Integration tests for bookgate
//!
//! These tests drive the real actix application and shared state without
//! mocking.

pub mod admin_api_tests;
pub mod admission_gate_tests;
pub mod concurrency_tests;
