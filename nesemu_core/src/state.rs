//! Binary machine snapshots.
//!
//! Header, all little-endian:
//! - 4 bytes: magic "NESS"
//! - 4 bytes: format version
//! - 8 bytes: cartridge fingerprint
//!
//! The body is the bincode encoding of [`MachineState`]. Decoding must consume
//! it exactly, trailing bytes are rejected.

use crate::bus::BusState;
use crate::cpu::Cpu;
use crate::error::{Error, Result};
use bincode::config::Config;
use serde::{Deserialize, Serialize};

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"NESS";

/// Bump on any layout change.
pub const SNAPSHOT_VERSION: u32 = 2;

const HEADER_SIZE: usize = 16;

/// A machine state is around 12 KiB, anything past this is garbage.
const BODY_LIMIT: usize = 1 << 20;

#[derive(Serialize, Deserialize)]
pub struct MachineState {
    pub cpu: Cpu,
    pub bus: BusState,
}

fn config() -> impl Config {
    bincode::config::standard().with_limit::<BODY_LIMIT>()
}

pub fn encode(fingerprint: u64, state: &MachineState) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(HEADER_SIZE + 0x4000);
    data.extend_from_slice(&SNAPSHOT_MAGIC);
    data.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    data.extend_from_slice(&fingerprint.to_le_bytes());
    data.extend_from_slice(&bincode::serde::encode_to_vec(state, config())?);
    Ok(data)
}

/// Validates magic and version, returning the stored cartridge fingerprint
/// and the body.
pub fn read_header(data: &[u8]) -> Result<(u64, &[u8])> {
    if data.len() < HEADER_SIZE || data[..4] != SNAPSHOT_MAGIC {
        return Err(Error::InvalidSnapshot);
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&data[4..8]);
    let version = u32::from_le_bytes(version);
    if version != SNAPSHOT_VERSION {
        return Err(Error::SnapshotVersion(version));
    }

    let mut fingerprint = [0u8; 8];
    fingerprint.copy_from_slice(&data[8..HEADER_SIZE]);
    Ok((u64::from_le_bytes(fingerprint), &data[HEADER_SIZE..]))
}

pub fn decode(body: &[u8]) -> Result<MachineState> {
    let (state, read) = bincode::serde::decode_from_slice(body, config()).map_err(|e| {
        log::debug!("snapshot body rejected: {}", e);
        Error::InvalidSnapshot
    })?;
    if read != body.len() {
        log::debug!("snapshot body has {} trailing bytes", body.len() - read);
        return Err(Error::InvalidSnapshot);
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus;
    use crate::cart::tests::ines;
    use crate::cart::Cartridge;

    fn machine() -> MachineState {
        let bus = Bus::new(Cartridge::from_ines(&ines(1, 2, 0, 0b10)).unwrap());
        MachineState {
            cpu: Cpu::new(),
            bus: bus.state(),
        }
    }

    #[test]
    fn test_header() {
        let data = encode(0xdead_beef, &machine()).unwrap();
        assert_eq!(&data[..4], b"NESS");
        assert_eq!(&data[4..8], &SNAPSHOT_VERSION.to_le_bytes());

        let (fingerprint, body) = read_header(&data).unwrap();
        assert_eq!(fingerprint, 0xdead_beef);
        assert_eq!(body.len(), data.len() - HEADER_SIZE);
        assert!(decode(body).is_ok());
    }

    #[test]
    fn test_bad_header() {
        assert!(matches!(read_header(b"NESX\x02\0\0\0"), Err(Error::InvalidSnapshot)));
        assert!(matches!(read_header(b"NESS\x02\0\0\0"), Err(Error::InvalidSnapshot)));

        let mut data = encode(0, &machine()).unwrap();
        data[4] = 99;
        assert!(matches!(read_header(&data), Err(Error::SnapshotVersion(99))));
    }

    #[test]
    fn test_body_must_be_exact() {
        let data = encode(0, &machine()).unwrap();
        let (_, body) = read_header(&data).unwrap();

        let mut trailing = body.to_vec();
        trailing.push(0);
        assert!(matches!(decode(&trailing), Err(Error::InvalidSnapshot)));
        assert!(matches!(decode(&body[..body.len() / 2]), Err(Error::InvalidSnapshot)));
        assert!(matches!(decode(&[]), Err(Error::InvalidSnapshot)));
    }
}
