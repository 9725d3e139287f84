//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! - [`chain`]: [`MockChain`], an in-memory [`crate::ChainClient`] simulating
//!   the factory, its pools, nonces and failure injection.
//! - [`fixtures`]: the dev signer and canonical pool configurations.

pub mod chain;
pub mod fixtures;

pub use chain::{FACTORY_BYTECODE, MockChain, TRANSFER_GAS};
pub use fixtures::{DEPLOYER_KEY, deployer_address, signer};
