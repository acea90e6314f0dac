use anyhow::Result;

use super::{Status, Transport};
use crate::{Chip, config::EccOptions, constants::ERASED_BYTE, eeprom::Eeprom, error::StatusCode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Probe,
    Init {
        ecc: EccOptions,
        eeprom: Option<Eeprom>,
    },
    Erase { address: usize, length: usize },
    Write { address: usize, length: usize },
    Read { address: usize, length: usize },
}

/// Records every call and stores writes verbatim.
pub struct MockTransport {
    pub chip: Chip,
    pub memory: Vec<u8>,
    pub calls: Vec<Call>,
    pub shutdowns: usize,
    pub probe_fails: bool,
    pub init_fails: bool,
    pub erase_status: Option<StatusCode>,
    pub write_status: Option<StatusCode>,
    pub read_status: Option<StatusCode>,
    /// Flip every bit of the byte at this offset of each read
    pub corrupt_read_at: Option<usize>,
    /// Report reads as successful without touching the buffer
    pub stale_reads: bool,
}

impl MockTransport {
    pub fn new(chip: Chip) -> Self {
        MockTransport {
            memory: vec![ERASED_BYTE; chip.size],
            chip,
            calls: Vec::new(),
            shutdowns: 0,
            probe_fails: false,
            init_fails: false,
            erase_status: None,
            write_status: None,
            read_status: None,
            corrupt_read_at: None,
            stale_reads: false,
        }
    }

    pub fn io_calls(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| !matches!(c, Call::Probe | Call::Init { .. }))
            .collect()
    }
}

impl Transport for MockTransport {
    fn probe(&mut self) -> Result<()> {
        self.calls.push(Call::Probe);
        anyhow::ensure!(!self.probe_fails, "programmer not found");
        Ok(())
    }

    fn init_command_set(&mut self, ecc: EccOptions, eeprom: Option<&Eeprom>) -> Result<Chip> {
        self.calls.push(Call::Init {
            ecc,
            eeprom: eeprom.cloned(),
        });
        anyhow::ensure!(!self.init_fails, "no chip detected");
        Ok(self.chip.clone())
    }

    fn erase(&mut self, address: usize, length: usize) -> Status<()> {
        self.calls.push(Call::Erase { address, length });
        if let Some(code) = self.erase_status {
            return Err(code);
        }
        self.memory[address..address + length].fill(ERASED_BYTE);
        Ok(())
    }

    fn write(&mut self, data: &[u8], address: usize) -> Status<usize> {
        self.calls.push(Call::Write {
            address,
            length: data.len(),
        });
        if let Some(code) = self.write_status {
            return Err(code);
        }
        self.memory[address..address + data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8], address: usize) -> Status<usize> {
        self.calls.push(Call::Read {
            address,
            length: buf.len(),
        });
        if let Some(code) = self.read_status {
            return Err(code);
        }
        if self.stale_reads {
            return Ok(buf.len());
        }
        buf.copy_from_slice(&self.memory[address..address + buf.len()]);
        if let Some(offset) = self.corrupt_read_at {
            if let Some(byte) = buf.get_mut(offset) {
                *byte = !*byte;
            }
        }
        Ok(buf.len())
    }

    fn shutdown(&mut self) {
        self.shutdowns += 1;
    }
}
