//! Chip definitions, as reported by the transport after command-set initialization
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::eeprom::Eeprom;

/// Memory technology of a chip, decides erase and program semantics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChipKind {
    #[default]
    Nor,
    Nand,
    Eeprom,
}

/// Chip family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Family {
    pub name: String,
    pub kind: ChipKind,
    pub description: String,
    pub variants: Vec<Chip>,
}

/// Represents a flash or EEPROM chip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chip {
    pub name: String,
    /// JEDEC (or vendor) id bytes, empty for parts without one
    #[serde(default, deserialize_with = "parse_id")]
    pub id: Vec<u8>,
    #[serde(default)]
    pub kind: ChipKind,
    /// Total addressable length in bytes
    #[serde(deserialize_with = "parse_size")]
    pub size: usize,
    /// Erase granularity in bytes
    #[serde(deserialize_with = "parse_size")]
    pub block_size: usize,
}

impl ::std::fmt::Display for Chip {
    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        if self.id.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}(0x{})", self.name, hex::encode(&self.id))
        }
    }
}

impl Chip {
    pub fn new(name: impl Into<String>, kind: ChipKind, size: usize, block_size: usize) -> Self {
        Chip {
            name: name.into(),
            id: Vec::new(),
            kind,
            size,
            block_size,
        }
    }
}

impl From<&Eeprom> for Chip {
    fn from(eeprom: &Eeprom) -> Self {
        Chip::new(eeprom.name.to_uppercase(), ChipKind::Eeprom, eeprom.size, 1)
    }
}

pub struct ChipDB {
    families: Vec<Family>,
}

impl ChipDB {
    pub fn load() -> Result<Self> {
        let mut families: Vec<Family> = vec![
            serde_yaml::from_str(include_str!("../devices/spi-nor.yaml"))?,
            serde_yaml::from_str(include_str!("../devices/spi-nand.yaml"))?,
        ];
        for family in families.iter_mut() {
            for chip in family.variants.iter_mut() {
                chip.kind = family.kind;
            }
        }
        Ok(ChipDB { families })
    }

    pub fn families(&self) -> &[Family] {
        &self.families
    }

    pub fn chips(&self) -> impl Iterator<Item = &Chip> {
        self.families.iter().flat_map(|f| f.variants.iter())
    }

    pub fn find_chip(&self, name: &str) -> Result<Chip> {
        let chip = self
            .chips()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| anyhow::format_err!("Cannot find chip named {:?}", name))?;
        log::debug!("Find chip: {} ({:?})", chip, chip.kind);
        Ok(chip)
    }
}

fn parse_id<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    hex::decode(s).map_err(serde::de::Error::custom)
}

fn parse_size<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    size_from_str(&s).map_err(serde::de::Error::custom)
}

/// Parses `0x` hex, plain digits, or a decimal count with a K/M unit suffix.
pub fn size_from_str(s: &str) -> Result<usize> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return Ok(usize::from_str_radix(hex, 16)?);
    }
    let (digits, unit) = if let Some(d) = s.strip_suffix("KiB").or_else(|| s.strip_suffix("KB")) {
        (d, 1024)
    } else if let Some(d) = s.strip_suffix("MiB").or_else(|| s.strip_suffix("MB")) {
        (d, 1024 * 1024)
    } else if let Some(d) = s.strip_suffix('K') {
        (d, 1024)
    } else if let Some(d) = s.strip_suffix('M') {
        (d, 1024 * 1024)
    } else {
        (s, 1)
    };
    let value: usize = digits.parse()?;
    value
        .checked_mul(unit)
        .ok_or_else(|| anyhow::format_err!("size {:?} overflows", s))
}
