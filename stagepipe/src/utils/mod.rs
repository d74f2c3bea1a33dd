//! Utility functions for name validation and version timestamps.

pub mod timestamps;
mod validation;

pub use timestamps::{UnixSecondsStamp, VersionStamp};
pub use validation::{is_valid_name, validate_display_name, validate_name};
