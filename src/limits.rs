/// Longest booking or block, in minutes. Busy reads look back one day, so
/// nothing may span more than a day.
pub const MAX_DURATION_MINUTES: u32 = 24 * 60;
pub const MAX_TIER_HOURS: u32 = 24;
pub const MAX_HOURLY_RATE: f64 = 10_000.0;
pub const MAX_STOPS: u32 = 10;
pub const MAX_DISTANCE_KM: f64 = 2_000.0;
pub const MAX_ADDRESS_LEN: usize = 512;
pub const MAX_LABEL_LEN: usize = 1024;
/// Longest accepted request line on the wire.
pub const MAX_LINE_LEN: usize = 64 * 1024;
