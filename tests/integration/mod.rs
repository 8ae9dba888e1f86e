//! Integration tests for the snapshot cache

mod concurrency;
mod config_integration;
mod file_system_access;
mod logging_init;
mod watching;
