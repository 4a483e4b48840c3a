pub const ETHERNET_HEADER_LEN: usize = 14;

pub const IPV4_IHL_MASK: u8 = 0x0f;
/// The IHL field counts 32-bit words.
pub const IPV4_IHL_UNIT: usize = 4;
pub const IPV4_MIN_HEADER_LEN: usize = 20;

pub const UDP_HEADER_LEN: usize = 8;
