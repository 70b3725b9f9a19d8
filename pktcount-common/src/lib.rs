#![no_std]

/// Name of the XDP entry point in the compiled object.
pub const PROGRAM_NAME: &str = "count_packets";

/// Name of the single-cell counter map.
pub const COUNTER_MAP: &str = "PKT_COUNT";

/// The only key the counter map holds.
pub const COUNTER_KEY: u32 = 0;

/// Number of entries in the counter map.
pub const COUNTER_ENTRIES: u32 = 1;
