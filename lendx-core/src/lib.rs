#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]
#![forbid(unsafe_code)]

pub mod broker;
pub mod entities;
pub mod events;
pub mod framework;
pub mod processors;
pub mod registry;
pub mod store;
pub mod user_connections;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
