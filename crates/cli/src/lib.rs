//! Demonstration host for `seamless-core`.

pub mod config;
pub mod demo;
pub mod logging;
