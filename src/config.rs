//! Run configuration, filled in from the command line before the device is touched.

use std::path::PathBuf;

/// A primary operation as requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Identify,
    Erase,
    Read(PathBuf),
    Write(PathBuf),
}

/// ECC diagnostic switches, handed to the transport at command-set initialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EccOptions {
    /// Report ECC errors but keep reading
    pub ignore_errors: bool,
    /// Turn off on-die ECC, transfers then cover page + OOB
    pub disabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Every primary operation requested, in the order it was seen
    pub requests: Vec<Request>,
    pub address: usize,
    /// 0 means "up to the end of the device"
    pub length: usize,
    pub verify: bool,
    pub ecc: EccOptions,
    /// EEPROM part name, e.g. `24c64` or `93c46`
    pub eeprom: Option<String>,
    /// Microwire 8-bit organization (16-bit otherwise)
    pub org8: bool,
    /// Microwire address length in bits, automatic when unset
    pub addr_len: Option<u32>,
}

impl Config {
    pub fn request(mut self, request: Request) -> Self {
        self.requests.push(request);
        self
    }
}

/// Parses a number, `0x`/`0X` selects hexadecimal.
pub fn parse_number(s: &str) -> Result<usize, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number {:?}: {}", s, e))
}
