//! Common test utilities and helpers

#![allow(dead_code)]

pub mod fixtures;
pub mod test_helpers;

pub use mock_swapi::MockSwapi;
pub use test_helpers::*;
