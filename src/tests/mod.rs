//! In-crate test suites driven by the mock ledger

mod config_push_tests;
mod funding_tests;
mod signing_properties;
