use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// missing `NES\x1a` magic or an iNES 2.0 header
    InvalidInesHeader,
    UnsupportedMapper(u8),
    /// PRG/CHR data shorter than the header announces
    TruncatedRom,
    Io(io::Error),
    InvalidSnapshot,
    SnapshotVersion(u32),
    /// machine state could not be encoded
    Encode(bincode::error::EncodeError),
    /// snapshot was taken with a different cartridge
    CartridgeMismatch,
    /// palette files hold 64 or 512 RGB triplets
    InvalidPalette(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInesHeader => write!(f, "invalid iNES header"),
            Error::UnsupportedMapper(n) => write!(f, "unsupported mapper: {:03}", n),
            Error::TruncatedRom => write!(f, "rom image is truncated"),
            Error::Io(e) => write!(f, "i/o error: {}", e),
            Error::InvalidSnapshot => write!(f, "malformed snapshot"),
            Error::SnapshotVersion(v) => write!(f, "unsupported snapshot version: {}", v),
            Error::Encode(e) => write!(f, "snapshot encoding failed: {}", e),
            Error::CartridgeMismatch => write!(f, "snapshot belongs to another cartridge"),
            Error::InvalidPalette(len) => write!(f, "invalid palette file size: {} bytes", len),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Encode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<bincode::error::EncodeError> for Error {
    fn from(e: bincode::error::EncodeError) -> Self {
        Error::Encode(e)
    }
}
