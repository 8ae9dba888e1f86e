//! Property-based tests for hierarchy invariants
