//! Matrix-core hardware generations.

use std::fmt;
use std::str::FromStr;

/// Matrix-core (MFMA) instruction-set generation.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum MatrixCoreVersion {
    /// CDNA1 (gfx908).
    V1,
    /// CDNA2 (gfx90a).
    V2,
    /// CDNA3 (gfx940 / gfx941 / gfx942).
    V3,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("matrix-core version {0} is not one of 1, 2, 3")]
    OutOfRange(u32),
    #[error("invalid matrix-core version '{0}'")]
    Parse(String),
}

impl MatrixCoreVersion {
    pub fn major(self) -> u32 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }

    /// Minor revision carried in the accumulator encoding. No generation
    /// uses a non-zero minor today.
    pub fn minor(self) -> u32 {
        0
    }

    /// `true` for generations with the 8-bit float instructions.
    pub fn has_fp8(self) -> bool {
        self >= Self::V3
    }
}

impl TryFrom<u32> for MatrixCoreVersion {
    type Error = VersionError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            3 => Ok(Self::V3),
            other => Err(VersionError::OutOfRange(other)),
        }
    }
}

impl FromStr for MatrixCoreVersion {
    type Err = VersionError;

    /// Accepts the bare number or the CDNA generation name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "cdna1" => Ok(Self::V1),
            "2" | "cdna2" => Ok(Self::V2),
            "3" | "cdna3" => Ok(Self::V3),
            _ => Err(VersionError::Parse(s.to_string())),
        }
    }
}

impl fmt::Display for MatrixCoreVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mfma v{}", self.major())
    }
}
