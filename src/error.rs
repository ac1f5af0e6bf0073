use std::fmt;
use std::path::PathBuf;

/// Everything that can go wrong while loading a cartridge or stepping the core.
#[derive(Debug)]
pub enum Error {
    CantOpenFile(PathBuf),
    InvalidCartridgeHeader(String),
    InvalidCartridge(String),
    MemoryMapperNotSupported(u8),
    InvalidRead(u16),
    InvalidWrite(u16),
    UnknownOpcode(u8),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CantOpenFile(path) => write!(f, "cannot open file: {}", path.display()),
            Self::InvalidCartridgeHeader(reason) => {
                write!(f, "invalid cartridge header: {reason}")
            }
            Self::InvalidCartridge(reason) => write!(f, "invalid cartridge: {reason}"),
            Self::MemoryMapperNotSupported(id) => {
                write!(f, "memory mapper not supported: id {id:#04x}")
            }
            Self::InvalidRead(address) => write!(f, "invalid read at address {address:#06x}"),
            Self::InvalidWrite(address) => write!(f, "invalid write at address {address:#06x}"),
            Self::UnknownOpcode(opcode) => write!(f, "unknown opcode {opcode:#04x}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl From<std::io::Error> for Error {
    fn from(_: std::io::Error) -> Self {
        // Path is unknown at this generic conversion site; callers that have
        // a path in scope should build `Error::CantOpenFile` directly instead.
        Self::CantOpenFile(PathBuf::new())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
