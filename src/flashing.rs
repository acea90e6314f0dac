//! Chip programming logic: one erase, write (optionally verified) or read per run.

use std::{
    fmt,
    fs::File,
    io::{self, BufReader, Read, Seek, SeekFrom, Write},
    ops::{Deref, DerefMut},
    path::Path,
};

use crate::{
    Chip, Config, Transport,
    config::EccOptions,
    eeprom::{self, Eeprom},
    error::{Error, Mismatch, RangeError, Result, TransportOp, UsageError},
    progress,
    range::{self, Range, RangeKind},
    selector::{self, Operation},
};

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Identified(Chip),
    Erased(Range),
    Written {
        range: Range,
        /// Bytes taken from the source file
        source_len: usize,
        verified: bool,
    },
    Read(Range),
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Identified(chip) => write!(f, "Chip: {}", chip),
            Report::Erased(range) => write!(f, "Erased {}", range),
            Report::Written {
                range, verified, ..
            } => {
                write!(f, "Wrote {}", range)?;
                if *verified {
                    write!(f, ", verified")?;
                }
                Ok(())
            }
            Report::Read(range) => write!(f, "Read {}", range),
        }
    }
}

/// Owns a probed transport and shuts it down when dropped.
struct Session<T: Transport>(T);

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        log::debug!("Shutting down programmer");
        self.0.shutdown();
    }
}

impl<T: Transport> Deref for Session<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Transport> DerefMut for Session<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

/// What happens after the device accepted a write.
pub enum AfterWrite<R> {
    Done { range: Range, source_len: usize },
    /// Read the range back and compare it with the source
    Verify(VerifyPass<R>),
}

/// State handed from the write to the verify pass. The buffer is reused for
/// the read-back.
pub struct VerifyPass<R> {
    source: R,
    buffer: Vec<u8>,
    range: Range,
    source_len: usize,
}

impl<R> VerifyPass<R> {
    pub fn range(&self) -> Range {
        self.range
    }
}

pub struct Flashing<T: Transport> {
    session: Session<T>,
    chip: Chip,
}

impl<T: Transport> Flashing<T> {
    /// Probes the programmer and detects the chip.
    ///
    /// Once the probe succeeded the transport is shut down exactly once: when
    /// this returns an error, or when the `Flashing` is dropped.
    pub fn open(mut transport: T, ecc: EccOptions, eeprom: Option<&Eeprom>) -> Result<Self> {
        transport
            .probe()
            .map_err(|e| Error::DeviceUnavailable(format!("{:#}", e)))?;
        let mut session = Session(transport);
        let chip = session
            .init_command_set(ecc, eeprom)
            .map_err(|e| Error::DeviceUnavailable(format!("{:#}", e)))?;
        if chip.size == 0 {
            return Err(Error::DeviceUnavailable(format!("unsupported chip {}", chip)));
        }
        Ok(Flashing { session, chip })
    }

    pub fn chip(&self) -> &Chip {
        &self.chip
    }

    pub fn dump_info(&self) {
        log::info!(
            "Chip: {} ({:?}, {} bytes, block {} bytes)",
            self.chip,
            self.chip.kind,
            self.chip.size,
            self.chip.block_size
        );
        if !self.chip.id.is_empty() {
            log::info!("Chip ID: {}", hex::encode(&self.chip.id));
        }
    }

    pub fn resolve(
        &self,
        address: usize,
        length: usize,
        kind: RangeKind,
    ) -> std::result::Result<Range, RangeError> {
        range::resolve(address, length, &self.chip, kind)
    }

    pub fn erase(&mut self, range: Range) -> Result<()> {
        log::info!("Erase {}", range);
        let pb = progress::spinner(format!("Erasing {} bytes", range.length));
        let ret = self.session.erase(range.address, range.length);
        pb.finish_and_clear();
        ret.map_err(Error::transport(TransportOp::Erase))?;
        log::info!("Status: OK");
        Ok(())
    }

    /// Programs `range` from the file at `path`, reading it back if `verify`.
    pub fn write(&mut self, path: &Path, range: Range, verify: bool) -> Result<Report> {
        let file =
            File::open(path).map_err(Error::io(format!("cannot open {}", path.display())))?;
        match self.write_from(file, range, verify)? {
            AfterWrite::Done { range, source_len } => Ok(Report::Written {
                range,
                source_len,
                verified: false,
            }),
            AfterWrite::Verify(pass) => {
                let (range, source_len) = (pass.range, pass.source_len);
                self.verify(pass)?;
                Ok(Report::Written {
                    range,
                    source_len,
                    verified: true,
                })
            }
        }
    }

    /// Programs `range` with up to `range.length` bytes from `source`.
    ///
    /// When the range covers the whole chip the write is cut down to what the
    /// source actually holds. An explicit range is written as-is; a short
    /// source leaves the tail of the buffer zeroed.
    pub fn write_from<R: Read>(
        &mut self,
        mut source: R,
        range: Range,
        verify: bool,
    ) -> Result<AfterWrite<R>> {
        let mut buffer = vec![0u8; range.length + 1];
        let source_len = fill_from(&mut source, &mut buffer[..range.length])
            .map_err(Error::io("cannot read source file"))?;

        let mut range = range;
        if range.length == self.chip.size {
            range.length = source_len;
        } else if source_len < range.length {
            log::warn!(
                "Source holds only {} of {} bytes, writing the remainder as zeros",
                source_len,
                range.length
            );
        }

        log::info!("Write {}", range);
        let pb = progress::spinner(format!("Writing {} bytes", range.length));
        let ret = self
            .session
            .write(&buffer[..range.length], range.address);
        pb.finish_and_clear();
        let written = ret.map_err(Error::transport(TransportOp::Write))?;
        log::info!("Status: OK");
        if written != range.length {
            log::debug!("Transport reported {} of {} bytes", written, range.length);
        }

        if verify {
            Ok(AfterWrite::Verify(VerifyPass {
                source,
                buffer,
                range,
                source_len,
            }))
        } else {
            Ok(AfterWrite::Done { range, source_len })
        }
    }

    /// Reads the written range back into the inherited buffer and compares it
    /// with the source, rewound to its start.
    pub fn verify<R: Read + Seek>(&mut self, pass: VerifyPass<R>) -> Result<()> {
        let VerifyPass {
            mut source,
            mut buffer,
            range,
            ..
        } = pass;
        buffer.fill(0);

        log::info!("Verify {}", range);
        let pb = progress::spinner(format!("Verifying {} bytes", range.length));
        let ret = self
            .session
            .read(&mut buffer[..range.length], range.address);
        pb.finish_and_clear();
        ret.map_err(Error::transport(TransportOp::Read))?;

        source
            .seek(SeekFrom::Start(0))
            .map_err(Error::io("cannot rewind source file"))?;
        match compare(BufReader::new(&mut source), &buffer, range.length)
            .map_err(Error::io("cannot read source file"))?
        {
            None => {
                log::info!("Status: OK");
                Ok(())
            }
            Some(mismatch) => {
                log::error!("Status: FAILED ({})", mismatch);
                Err(Error::Verification(mismatch))
            }
        }
    }

    /// Reads `range` from the device into the file at `path`.
    ///
    /// The file is only created once the device read succeeded.
    pub fn read(&mut self, path: &Path, range: Range) -> Result<()> {
        let buffer = self.read_range(range)?;
        let mut file =
            File::create(path).map_err(Error::io(format!("cannot create {}", path.display())))?;
        file.write_all(&buffer[..range.length])
            .and_then(|_| file.flush())
            .map_err(Error::io(format!("cannot write {}", path.display())))?;
        log::info!("Status: OK");
        Ok(())
    }

    /// Reads `range` into a fresh buffer of `range.length + 1` bytes.
    pub fn read_range(&mut self, range: Range) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; range.length + 1];
        log::info!("Read {}", range);
        let pb = progress::spinner(format!("Reading {} bytes", range.length));
        let ret = self
            .session
            .read(&mut buffer[..range.length], range.address);
        pb.finish_and_clear();
        ret.map_err(Error::transport(TransportOp::Read))?;
        Ok(buffer)
    }
}

/// Reads until `buf` is full or the source is exhausted.
fn fill_from<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Compares `source` with `buffer` in lockstep.
///
/// The loop checks at most `length - 1` bytes and stops early at a mismatch
/// or at end of file. The source byte it stopped on is then compared with the
/// buffer slot at the same index, which is how the last byte of the range
/// gets checked. `buffer` must hold `length + 1` bytes.
fn compare<R: Read>(source: R, buffer: &[u8], length: usize) -> io::Result<Option<Mismatch>> {
    let mut bytes = source.bytes();
    let mut index = 0;
    let mut current = bytes.next().transpose()?;
    while let Some(byte) = current {
        if index >= length.saturating_sub(1) {
            break;
        }
        if byte != buffer[index] {
            return Ok(Some(Mismatch {
                offset: index,
                expected: Some(byte),
                found: buffer[index],
            }));
        }
        index += 1;
        current = bytes.next().transpose()?;
    }

    if current == Some(buffer[index]) {
        Ok(None)
    } else {
        Ok(Some(Mismatch {
            offset: index,
            expected: current,
            found: buffer[index],
        }))
    }
}

/// Runs the single operation selected by `config` against `transport`.
///
/// Usage errors are reported before the transport is probed.
pub fn run<T: Transport>(config: &Config, transport: T) -> Result<Report> {
    let operation = selector::select(config)?;
    let eeprom = eeprom::select(config)?;
    if eeprom.is_some() && operation == Operation::Identify {
        return Err(UsageError::EepromIdentify.into());
    }

    let mut flashing = Flashing::open(transport, config.ecc, eeprom.as_ref())?;
    match operation {
        Operation::Identify => {
            flashing.dump_info();
            Ok(Report::Identified(flashing.chip().clone()))
        }
        Operation::Erase => {
            let range = flashing.resolve(config.address, config.length, RangeKind::Erase)?;
            flashing.erase(range)?;
            Ok(Report::Erased(range))
        }
        Operation::Write { path, verify } => {
            let range = flashing.resolve(config.address, config.length, RangeKind::Transfer)?;
            flashing.write(&path, range, verify)
        }
        Operation::Read { path } => {
            let range = flashing.resolve(config.address, config.length, RangeKind::Transfer)?;
            flashing.read(&path, range)?;
            Ok(Report::Read(range))
        }
    }
}
