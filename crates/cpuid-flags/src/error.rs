//! Selector parse errors.

/// A malformed flag selector. Positions are byte offsets into the input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlagError {
    #[error("unexpected character '{found}' at position {position}")]
    UnexpectedChar { position: usize, found: char },

    #[error("expected {expected} at position {position}, found '{found}'")]
    UnexpectedToken {
        position: usize,
        found: String,
        expected: &'static str,
    },

    #[error("expected {expected}, found end of input")]
    UnexpectedEnd { expected: &'static str },

    #[error("invalid number '{text}' at position {position}")]
    InvalidNumber { position: usize, text: String },

    #[error("unknown leaf mnemonic '{name}' at position {position}")]
    UnknownLeaf { position: usize, name: String },

    #[error("unknown register '{name}' at position {position}")]
    UnknownRegister { position: usize, name: String },

    #[error("bit {bit} at position {position} is outside a 32-bit register")]
    BitOutOfRange { position: usize, bit: u32 },

    #[error("bit range {high}:{low} at position {position} has its high bit below its low bit")]
    InvertedRange { position: usize, high: u32, low: u32 },
}

impl FlagError {
    /// Byte offset of the offending token; `None` at end of input.
    pub fn position(&self) -> Option<usize> {
        match self {
            FlagError::UnexpectedEnd { .. } => None,
            FlagError::UnexpectedChar { position, .. }
            | FlagError::UnexpectedToken { position, .. }
            | FlagError::InvalidNumber { position, .. }
            | FlagError::UnknownLeaf { position, .. }
            | FlagError::UnknownRegister { position, .. }
            | FlagError::BitOutOfRange { position, .. }
            | FlagError::InvertedRange { position, .. } => Some(*position),
        }
    }
}

/// Result type alias for selector operations.
pub type Result<T> = std::result::Result<T, FlagError>;
