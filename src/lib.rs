#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::uninlined_format_args)]
// Intentional casts for durations, timestamps and counters
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod content;
pub mod errors;
pub mod gateway;
pub mod maturation;
pub mod providers;
pub mod schedule;
pub(crate) mod utils;

/// Re-exports for fuzz targets. Not part of the public API.
#[doc(hidden)]
pub mod fuzz_api {
    pub use crate::providers::base::{extract_phone, receipt_from_body};
    pub use crate::utils::phone::normalize_phone;
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
