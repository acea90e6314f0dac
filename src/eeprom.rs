//! I2C (24cXX) and Microwire (93cXX) EEPROM selection.

use crate::{config::Config, constants::MAX_ADDR_LEN, error::UsageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EepromBus {
    I2c,
    Microwire,
}

/// Microwire word organization, selected with a jumper on the adapter board
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Organization {
    Bits8,
    #[default]
    Bits16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eeprom {
    pub name: String,
    pub bus: EepromBus,
    /// Size in bytes
    pub size: usize,
    pub org: Organization,
    /// Fixed address length in bits, automatic when `None`
    pub addr_len: Option<u32>,
}

impl Eeprom {
    /// Bytes per addressed word.
    pub const fn word_size(&self) -> usize {
        match (self.bus, self.org) {
            (EepromBus::Microwire, Organization::Bits16) => 2,
            _ => 1,
        }
    }

    /// Address bits the part needs for its word count.
    pub fn auto_address_bits(&self) -> u32 {
        let words = (self.size / self.word_size()).max(1);
        words.next_power_of_two().trailing_zeros()
    }

    /// Address length put on the bus, the fixed one when set.
    pub fn address_bits(&self) -> u32 {
        self.addr_len.unwrap_or_else(|| self.auto_address_bits())
    }
}

const I2C_PARTS: &[(&str, usize)] = &[
    ("24c01", 128),
    ("24c02", 256),
    ("24c04", 512),
    ("24c08", 1024),
    ("24c16", 2048),
    ("24c32", 4096),
    ("24c64", 8192),
    ("24c128", 16384),
    ("24c256", 32768),
    ("24c512", 65536),
    ("24c1024", 131072),
];

const MICROWIRE_PARTS: &[(&str, usize)] = &[
    ("93c06", 32),
    ("93c16", 128),
    ("93c46", 128),
    ("93c56", 256),
    ("93c66", 512),
    ("93c76", 1024),
    ("93c86", 2048),
    ("93c96", 4096),
];

/// Looks up an EEPROM part by name, ignoring case.
pub fn lookup(name: &str) -> Option<(EepromBus, usize)> {
    let find = |parts: &[(&str, usize)]| {
        parts
            .iter()
            .find(|(part, _)| part.eq_ignore_ascii_case(name))
            .map(|&(_, size)| size)
    };
    find(I2C_PARTS)
        .map(|size| (EepromBus::I2c, size))
        .or_else(|| find(MICROWIRE_PARTS).map(|size| (EepromBus::Microwire, size)))
}

/// All known part names, I2C first.
pub fn part_names() -> impl Iterator<Item = &'static str> {
    I2C_PARTS.iter().chain(MICROWIRE_PARTS).map(|&(name, _)| name)
}

/// Resolves the EEPROM options of `config`, `None` when no EEPROM was selected.
pub fn select(config: &Config) -> Result<Option<Eeprom>, UsageError> {
    let Some(name) = config.eeprom.as_deref() else {
        if config.org8 {
            return Err(UsageError::MicrowireOnly("-8"));
        }
        if config.addr_len.is_some() {
            return Err(UsageError::MicrowireOnly("-f"));
        }
        return Ok(None);
    };

    let (bus, size) = lookup(name).ok_or_else(|| UsageError::UnknownEeprom(name.to_string()))?;
    if bus == EepromBus::I2c {
        if config.org8 {
            return Err(UsageError::MicrowireOnly("-8"));
        }
        if config.addr_len.is_some() {
            return Err(UsageError::MicrowireOnly("-f"));
        }
    }
    if let Some(bits) = config.addr_len {
        if bits > MAX_ADDR_LEN {
            return Err(UsageError::AddressLength(bits));
        }
    }
    if config.length > size {
        return Err(UsageError::EepromLength {
            name: name.to_string(),
            length: config.length,
            size,
        });
    }

    let org = if config.org8 {
        Organization::Bits8
    } else {
        Organization::Bits16
    };
    log::debug!("Selected {:?} EEPROM {} ({} bytes, {:?})", bus, name, size, org);
    Ok(Some(Eeprom {
        name: name.to_lowercase(),
        bus,
        size,
        org,
        addr_len: config.addr_len,
    }))
}
