//! Integration tests

mod collector_test;
mod config_test;
mod replay_test;
