//! Integration tests module
//!
//! This module organizes all integration tests for the koalad daemon.

pub mod config_test;
pub mod ipc_test;
pub mod session_test;
