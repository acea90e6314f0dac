//! SPI NOR/NAND/EEPROM programming, one operation per run.

pub mod config;
pub mod constants;
pub mod device;
pub mod eeprom;
pub mod error;
pub mod flashing;
pub mod progress;
pub mod range;
pub mod selector;
pub mod transport;

pub use self::config::Config;
pub use self::device::Chip;
pub use self::error::{Error, Result};
pub use self::flashing::{Flashing, Report, run};
pub use self::range::Range;
pub use self::selector::Operation;
pub use self::transport::Transport;
