//! Exit codes returned by the commands.

pub const NO_ERROR: i32 = 0;
pub const FATAL_ERROR: i32 = 1;
