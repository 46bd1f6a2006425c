//! Core AURA library (reveal renderer, transcript, backend client, config).

pub mod client;
pub mod config;
pub mod fragment;
pub mod interrupt;
pub mod logging;
pub mod markdown;
pub mod math;
pub mod reveal;
pub mod session;
pub mod transcript;
