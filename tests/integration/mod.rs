//! Integration tests for the Tether directory replicator

mod local_mirror;
mod propagation;
mod reconciliation;
mod test_utils;
