//! Shared test utilities for seamless-core.
//!
//! Tiny convolutional networks with deterministic weights, small enough to
//! run on CPU in unit and integration tests.

mod networks;

pub use networks::{box_conv, ResBlock, TinyDecoder, TinyDenoiser};
