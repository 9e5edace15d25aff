#![cfg_attr(not(test), no_std)]

mod fmt;
mod peripherals;

pub use peripherals::*;
