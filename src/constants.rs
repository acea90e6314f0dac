
/// Value of an erased flash cell.
pub const ERASED_BYTE: u8 = 0xff;

/// Widest Microwire address accepted by `-f`.
pub const MAX_ADDR_LEN: u32 = 32;

/// Chip impersonated by the emulated programmer when none is named.
pub const DEFAULT_CHIP: &str = "W25Q32";

/// Status codes returned by the emulated programmer.
pub mod status {
    pub const NOT_PROBED: i32 = -1;
    pub const OUT_OF_RANGE: i32 = -2;
    pub const MISALIGNED: i32 = -3;
}
