//! Emulated programmer, a chip held in memory and optionally backed by an image file.
use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{Status, Transport};
use crate::{
    Chip,
    config::EccOptions,
    constants::{ERASED_BYTE, status},
    device::ChipKind,
    eeprom::{Eeprom, EepromBus},
    error::StatusCode,
};

pub struct EmulatedTransport {
    chip: Chip,
    image: Option<PathBuf>,
    memory: Vec<u8>,
    /// EEPROM bus settings handed over at command-set initialization
    eeprom: Option<Eeprom>,
    probed: bool,
    dirty: bool,
}

impl EmulatedTransport {
    /// A blank chip, lost on shutdown.
    pub fn new(chip: Chip) -> Self {
        EmulatedTransport {
            chip,
            image: None,
            memory: Vec::new(),
            eeprom: None,
            probed: false,
            dirty: false,
        }
    }

    /// A chip loaded from `path` at probe time and written back on shutdown.
    /// The file is created on shutdown if it does not exist.
    pub fn with_image(chip: Chip, path: impl Into<PathBuf>) -> Self {
        EmulatedTransport {
            image: Some(path.into()),
            ..Self::new(chip)
        }
    }

    pub fn chip(&self) -> &Chip {
        &self.chip
    }

    pub fn image(&self) -> Option<&Path> {
        self.image.as_deref()
    }

    /// EEPROM settings in use, `None` for flash chips.
    pub fn eeprom(&self) -> Option<&Eeprom> {
        self.eeprom.as_ref()
    }

    /// Current chip contents, empty before probing.
    pub fn contents(&self) -> &[u8] {
        &self.memory
    }

    fn check(&self, address: usize, length: usize) -> Status<()> {
        if !self.probed {
            return Err(StatusCode(status::NOT_PROBED));
        }
        match address.checked_add(length) {
            Some(end) if end <= self.memory.len() => Ok(()),
            _ => Err(StatusCode(status::OUT_OF_RANGE)),
        }
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let raw = std::fs::read(path)?;
        anyhow::ensure!(
            raw.len() <= self.chip.size,
            "image {} is {} bytes, larger than {} ({} bytes)",
            path.display(),
            raw.len(),
            self.chip,
            self.chip.size
        );
        self.memory[..raw.len()].copy_from_slice(&raw);
        log::debug!("Loaded {} bytes from {}", raw.len(), path.display());
        Ok(())
    }
}

impl Transport for EmulatedTransport {
    fn probe(&mut self) -> Result<()> {
        self.memory = vec![ERASED_BYTE; self.chip.size];
        if let Some(path) = self.image.clone() {
            if path.exists() {
                self.load(&path)?;
            } else {
                log::debug!("Image {} not found, starting blank", path.display());
            }
        }
        self.probed = true;
        self.dirty = false;
        Ok(())
    }

    fn init_command_set(&mut self, ecc: EccOptions, eeprom: Option<&Eeprom>) -> Result<Chip> {
        anyhow::ensure!(self.probed, "programmer not probed");
        anyhow::ensure!(self.chip.size > 0, "unsupported chip {}", self.chip);

        match (self.chip.kind, eeprom) {
            (ChipKind::Eeprom, Some(eeprom)) => {
                anyhow::ensure!(
                    eeprom.size == self.chip.size,
                    "EEPROM {} is {} bytes, programmer holds {} bytes",
                    eeprom.name,
                    eeprom.size,
                    self.chip.size
                );
                if eeprom.bus == EepromBus::Microwire {
                    let bits = eeprom.address_bits();
                    anyhow::ensure!(
                        bits >= eeprom.auto_address_bits(),
                        "{} bit addresses cannot reach all of {} ({} bits needed)",
                        bits,
                        eeprom.name,
                        eeprom.auto_address_bits()
                    );
                    log::info!(
                        "Microwire {:?} organization, {} bit addresses",
                        eeprom.org,
                        bits
                    );
                }
                self.eeprom = Some(eeprom.clone());
            }
            (ChipKind::Eeprom, None) => {
                anyhow::bail!("{} is an EEPROM, select it with -E", self.chip)
            }
            (_, Some(eeprom)) => {
                anyhow::bail!("EEPROM {} selected, but {} is attached", eeprom.name, self.chip)
            }
            (_, None) => self.eeprom = None,
        }

        if self.chip.kind == ChipKind::Nand {
            if ecc.disabled {
                log::info!("On-die ECC disabled");
            }
            if ecc.ignore_errors {
                log::info!("Ignoring ECC errors");
            }
        } else if ecc != EccOptions::default() {
            log::warn!("{} has no ECC, ECC options ignored", self.chip);
        }

        log::info!(
            "Detected {} flash: {} ({} KiB, block {} KiB)",
            match self.chip.kind {
                ChipKind::Nor => "SPI NOR",
                ChipKind::Nand => "SPI NAND",
                ChipKind::Eeprom => "EEPROM",
            },
            self.chip,
            self.chip.size / 1024,
            self.chip.block_size / 1024
        );
        Ok(self.chip.clone())
    }

    fn erase(&mut self, address: usize, length: usize) -> Status<()> {
        self.check(address, length)?;
        let block = self.chip.block_size.max(1);
        if address % block != 0 || length % block != 0 {
            return Err(StatusCode(status::MISALIGNED));
        }
        self.memory[address..address + length].fill(ERASED_BYTE);
        self.dirty = true;
        Ok(())
    }

    fn write(&mut self, data: &[u8], address: usize) -> Status<usize> {
        self.check(address, data.len())?;
        if let Some(eeprom) = &self.eeprom {
            let word = eeprom.word_size();
            if address % word != 0 || data.len() % word != 0 {
                return Err(StatusCode(status::MISALIGNED));
            }
        }
        let cells = &mut self.memory[address..address + data.len()];
        match self.chip.kind {
            ChipKind::Eeprom => cells.copy_from_slice(data),
            // programming only ever clears bits
            ChipKind::Nor | ChipKind::Nand => {
                cells.iter_mut().zip(data).for_each(|(cell, &byte)| *cell &= byte)
            }
        }
        self.dirty = true;
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8], address: usize) -> Status<usize> {
        self.check(address, buf.len())?;
        buf.copy_from_slice(&self.memory[address..address + buf.len()]);
        Ok(buf.len())
    }

    fn shutdown(&mut self) {
        if let (true, Some(path)) = (self.dirty, &self.image) {
            match std::fs::write(path, &self.memory) {
                Ok(()) => log::debug!("Saved image to {}", path.display()),
                Err(e) => log::error!("Failed to save image {}: {}", path.display(), e),
            }
        }
        self.probed = false;
        self.dirty = false;
    }
}
