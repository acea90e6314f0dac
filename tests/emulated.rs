use std::path::PathBuf;

use snander::{
    Chip, Config, Error, Range, Report,
    config::Request,
    device::{ChipDB, ChipKind},
    error::{RangeError, UsageError},
    transport::EmulatedTransport,
};

fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("snander-it-{}-{}", std::process::id(), name))
}

fn w25q80() -> Chip {
    ChipDB::load().unwrap().find_chip("W25Q80").unwrap()
}

fn firmware(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn write_verify_read_back_through_image() {
    let image = scratch("image.bin");
    let source = scratch("source.bin");
    let dump = scratch("dump.bin");
    let _ = std::fs::remove_file(&image);
    std::fs::write(&source, firmware(100)).unwrap();

    let config = Config {
        verify: true,
        ..Config::default().request(Request::Write(source.clone()))
    };
    let report = snander::run(&config, EmulatedTransport::with_image(w25q80(), &image)).unwrap();
    assert_eq!(
        report,
        Report::Written {
            range: Range::new(0, 100),
            source_len: 100,
            verified: true,
        }
    );
    assert_eq!(std::fs::metadata(&image).unwrap().len(), 1048576);

    let config = Config {
        length: 128,
        ..Config::default().request(Request::Read(dump.clone()))
    };
    let report = snander::run(&config, EmulatedTransport::with_image(w25q80(), &image)).unwrap();
    assert_eq!(report, Report::Read(Range::new(0, 128)));
    let read = std::fs::read(&dump).unwrap();
    assert_eq!(&read[..100], &firmware(100)[..]);
    assert!(read[100..].iter().all(|&b| b == 0xff));

    for path in [image, source, dump] {
        std::fs::remove_file(path).unwrap();
    }
}

#[test]
fn rewrite_without_erase_fails_verification() {
    let image = scratch("dirty.bin");
    let first = scratch("first.bin");
    let second = scratch("second.bin");
    let _ = std::fs::remove_file(&image);
    std::fs::write(&first, [0x0fu8; 64]).unwrap();
    std::fs::write(&second, [0xf0u8; 64]).unwrap();

    let write = |path: &PathBuf| Config {
        verify: true,
        ..Config::default().request(Request::Write(path.clone()))
    };
    snander::run(&write(&first), EmulatedTransport::with_image(w25q80(), &image)).unwrap();
    let err = snander::run(&write(&second), EmulatedTransport::with_image(w25q80(), &image))
        .unwrap_err();
    match err {
        Error::Verification(mismatch) => {
            assert_eq!(mismatch.offset, 0);
            assert_eq!(mismatch.expected, Some(0xf0));
            assert_eq!(mismatch.found, 0x00);
        }
        other => panic!("unexpected {:?}", other),
    }

    let erase = Config {
        length: 4096,
        ..Config::default().request(Request::Erase)
    };
    let report = snander::run(&erase, EmulatedTransport::with_image(w25q80(), &image)).unwrap();
    assert_eq!(report, Report::Erased(Range::new(0, 4096)));
    snander::run(&write(&second), EmulatedTransport::with_image(w25q80(), &image)).unwrap();

    for path in [image, first, second] {
        std::fs::remove_file(path).unwrap();
    }
}

#[test]
fn erase_requires_whole_blocks() {
    let config = Config {
        length: 5000,
        ..Config::default().request(Request::Erase)
    };
    let err = snander::run(&config, EmulatedTransport::new(w25q80())).unwrap_err();
    assert!(matches!(
        err,
        Error::Range(RangeError::Misaligned {
            length: 5000,
            block_size: 4096
        })
    ));

    let config = Config::default().request(Request::Erase);
    let report = snander::run(&config, EmulatedTransport::new(w25q80())).unwrap();
    assert_eq!(report, Report::Erased(Range::new(0, 1048576)));
}

#[test]
fn eeprom_round_trip() {
    let source = scratch("eeprom-src.bin");
    std::fs::write(&source, firmware(256)).unwrap();
    let config = Config {
        eeprom: Some("24c02".into()),
        verify: true,
        ..Config::default().request(Request::Write(source.clone()))
    };
    let eeprom = snander::eeprom::select(&config).unwrap().unwrap();
    let chip = Chip::from(&eeprom);
    assert_eq!(chip.kind, ChipKind::Eeprom);
    assert_eq!(chip.size, 256);

    let report = snander::run(&config, EmulatedTransport::new(chip)).unwrap();
    assert!(matches!(report, Report::Written { verified: true, .. }));
    std::fs::remove_file(source).unwrap();
}

#[test]
fn conflicting_flags_rejected() {
    let config = Config::default()
        .request(Request::Identify)
        .request(Request::Read(scratch("never.bin")));
    let err = snander::run(&config, EmulatedTransport::new(w25q80())).unwrap_err();
    assert!(matches!(err, Error::Usage(UsageError::Conflict)));
    assert!(!scratch("never.bin").exists());
}

#[test]
fn microwire_address_length_checked_by_programmer() {
    let erase = |addr_len| Config {
        eeprom: Some("93c46".into()),
        org8: true,
        addr_len,
        ..Config::default().request(Request::Erase)
    };
    let chip = |config: &Config| Chip::from(&snander::eeprom::select(config).unwrap().unwrap());

    let config = erase(Some(6));
    let err = snander::run(&config, EmulatedTransport::new(chip(&config))).unwrap_err();
    assert!(matches!(err, Error::DeviceUnavailable(_)));

    let config = erase(Some(7));
    let report = snander::run(&config, EmulatedTransport::new(chip(&config))).unwrap();
    assert_eq!(report, Report::Erased(Range::new(0, 128)));
}
