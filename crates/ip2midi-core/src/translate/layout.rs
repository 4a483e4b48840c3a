/// Capacity of the reusable event list, in bytes.
pub const EVENT_LIST_CAPACITY: usize = 1024;

/// Bytes taken from the payload per event in hex-string mode.
pub const HEX_EVENT_LEN: usize = 3;
