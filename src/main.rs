use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser};

use snander::{
    Chip, Config, Error,
    config::{EccOptions, Request, parse_number},
    constants::DEFAULT_CHIP,
    device::ChipDB,
    transport::EmulatedTransport,
};

#[derive(clap::Parser)]
#[command(
    name = "SNANDer",
    version,
    about = "SPI NOR/NAND/EEPROM programmer",
    author = "McMCC <mcmcc@mail.ru>"
)]
struct Cli {
    /// Disable internal ECC (use read/write page size + OOB size)
    #[arg(short = 'd')]
    disable_ecc: bool,
    /// Ignore ECC errors (for read testing only)
    #[arg(short = 'I')]
    ignore_ecc: bool,
    /// Print the list of supported chips
    #[arg(short = 'L')]
    list: bool,
    /// Read chip ID info
    #[arg(short = 'i')]
    identify: bool,
    /// Select I2C EEPROM {24c01..24c1024} or Microwire EEPROM {93c06..93c96}
    #[arg(short = 'E', value_name = "EEPROM")]
    eeprom: Option<String>,
    /// Microwire EEPROM 8-bit organization (default 16-bit)
    #[arg(short = '8')]
    org8: bool,
    /// Microwire EEPROM address length in bits (default auto)
    #[arg(short = 'f', value_name = "BITS", value_parser = parse_number)]
    addr_len: Option<usize>,
    /// Erase chip (full chip or use -a [-l])
    #[arg(short = 'e')]
    erase: bool,
    /// Manually set length
    #[arg(short = 'l', value_name = "LEN", value_parser = parse_number, default_value = "0")]
    length: usize,
    /// Manually set address
    #[arg(short = 'a', value_name = "ADDR", value_parser = parse_number, default_value = "0")]
    address: usize,
    /// Write chip from file
    #[arg(short = 'w', value_name = "FILE")]
    write: Option<PathBuf>,
    /// Read chip to file
    #[arg(short = 'r', value_name = "FILE")]
    read: Option<PathBuf>,
    /// Verify after write to chip
    #[arg(short = 'v')]
    verify: bool,
    /// Chip impersonated by the emulated programmer
    #[arg(long, value_name = "NAME", default_value = DEFAULT_CHIP)]
    chip: String,
    /// Image file backing the emulated programmer
    #[arg(long, value_name = "FILE")]
    image: Option<PathBuf>,
    /// Debug output
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn to_config(&self) -> Config {
        let mut requests = Vec::new();
        if self.identify {
            requests.push(Request::Identify);
        }
        if self.erase {
            requests.push(Request::Erase);
        }
        if let Some(path) = &self.read {
            requests.push(Request::Read(path.clone()));
        }
        if let Some(path) = &self.write {
            requests.push(Request::Write(path.clone()));
        }
        Config {
            requests,
            address: self.address,
            length: self.length,
            verify: self.verify,
            ecc: EccOptions {
                ignore_errors: self.ignore_ecc,
                disabled: self.disable_ecc,
            },
            eeprom: self.eeprom.clone(),
            org8: self.org8,
            addr_len: self
                .addr_len
                .map(|bits| u32::try_from(bits).unwrap_or(u32::MAX)),
        }
    }

    /// Chip for the emulated programmer, looked up only once the flags are
    /// known to be consistent.
    fn resolve_chip(&self, config: &Config, db: &ChipDB) -> Result<Chip, Error> {
        snander::selector::select(config)?;
        match snander::eeprom::select(config)? {
            Some(eeprom) => Ok(Chip::from(&eeprom)),
            None => db
                .find_chip(&self.chip)
                .map_err(|e| Error::DeviceUnavailable(format!("{:#}", e))),
        }
    }
}

fn list_chips(db: &ChipDB) {
    for family in db.families() {
        println!("{}:", family.name);
        for chip in &family.variants {
            println!("  {:<16} {:>8} KiB", chip.name, chip.size / 1024);
        }
    }
    println!("EEPROM:");
    for name in snander::eeprom::part_names() {
        println!("  {}", name);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = simplelog::TermLogger::init(
        if cli.debug {
            simplelog::LevelFilter::Debug
        } else {
            simplelog::LevelFilter::Info
        },
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    log::info!(
        "SNANDer - SPI NOR/NAND/EEPROM programmer v.{}",
        env!("CARGO_PKG_VERSION")
    );

    let db = ChipDB::load()?;
    if cli.list {
        list_chips(&db);
        return Ok(());
    }

    let config = cli.to_config();
    let chip = match cli.resolve_chip(&config, &db) {
        Ok(chip) => chip,
        Err(Error::Usage(e)) => {
            Cli::command().print_help()?;
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };
    let transport = match &cli.image {
        Some(path) => EmulatedTransport::with_image(chip, path),
        None => EmulatedTransport::new(chip),
    };

    match snander::run(&config, transport) {
        Ok(report) => {
            log::info!("{}", report);
            Ok(())
        }
        Err(Error::Usage(e)) => {
            Cli::command().print_help()?;
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}
