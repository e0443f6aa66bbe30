#![deny(clippy::expect_used, clippy::unwrap_used)]

//! The root of the Relentless congestion control library.
//! Relentless 拥塞控制库的根。

pub mod config;
pub mod error;
pub mod registry;

pub mod congestion;

#[cfg(test)]
mod testing;
