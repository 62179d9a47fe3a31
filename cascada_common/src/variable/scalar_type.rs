use ::core::fmt::Display;

use ::anyhow::anyhow;

use crate::error::{CascadaError, Result};

/// The fixed-width numeric kinds a work unit field can have.
/// The discriminants are the codes the coordinator uses in project schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    U8 = 0,
    U32 = 1,
    U64 = 2,
    Float = 3,
    Double = 4,
    I32 = 5,
    I64 = 6,
}

impl ScalarType {
    pub fn code(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for ScalarType {
    type Error = CascadaError;

    fn try_from(code: i64) -> Result<Self> {
        match code {
            0 => Ok(Self::U8),
            1 => Ok(Self::U32),
            2 => Ok(Self::U64),
            3 => Ok(Self::Float),
            4 => Ok(Self::Double),
            5 => Ok(Self::I32),
            6 => Ok(Self::I64),
            code => Err(CascadaError::invalid_type(anyhow!(
                "unknown scalar type code {}",
                code
            ))),
        }
    }
}

impl Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::U8 => "u8",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::Float => "float",
            Self::Double => "double",
            Self::I32 => "i32",
            Self::I64 => "i64",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CascadaErrorType;

    #[test]
    fn code_round_trips_for_every_type() -> Result<()> {
        for code in 0..=6 {
            assert_eq!(ScalarType::try_from(code)?.code(), code);
        }
        Ok(())
    }

    #[test]
    fn unknown_code_is_invalid_type() {
        let err = ScalarType::try_from(7).unwrap_err();
        assert_eq!(err.get_error_type(), CascadaErrorType::InvalidType);
        assert_eq!(err.to_string(), "Invalid type: unknown scalar type code 7");
        assert!(ScalarType::try_from(-1).is_err());
    }
}
