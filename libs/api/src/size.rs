use serde::{Deserialize, Serialize};

use crate::error::ByteSizeError;

const KB: u64 = 1024;
const MB: u64 = 1024 * 1024;

/// Размер в байтах для лимита `limit.size`.
///
/// В документе модели записывается строкой: `"512"`, `"10kb"`, `"5mb"`.
/// Голое JSON-число тоже принимается и трактуется как байты.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteSize(u64);

impl ByteSize {
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn bytes(self) -> u64 {
        self.0
    }

    /// Разобрать строку вида `<int>`, `<int>kb`, `<int>mb` (регистр суффикса
    /// не важен, пробелы по краям игнорируются).
    pub fn parse(input: &str) -> Result<Self, ByteSizeError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(ByteSizeError::Empty);
        }

        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (number, suffix) = s.split_at(split);
        if number.is_empty() {
            return Err(ByteSizeError::InvalidNumber(input.to_string()));
        }

        let multiplier = match suffix.trim().to_ascii_lowercase().as_str() {
            "" => 1,
            "kb" => KB,
            "mb" => MB,
            other => {
                return Err(ByteSizeError::UnknownSuffix {
                    input: input.to_string(),
                    suffix: other.to_string(),
                });
            }
        };

        let n: u64 = number
            .parse()
            .map_err(|_| ByteSizeError::Overflow(input.to_string()))?;
        n.checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(|| ByteSizeError::Overflow(input.to_string()))
    }
}

impl std::str::FromStr for ByteSize {
    type Err = ByteSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ByteSize {
    /// Кратчайшая точная форма: `"10mb"`, `"3kb"`, `"1500"`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let b = self.0;
        if b != 0 && b % MB == 0 {
            write!(f, "{}mb", b / MB)
        } else if b != 0 && b % KB == 0 {
            write!(f, "{}kb", b / KB)
        } else {
            write!(f, "{b}")
        }
    }
}

impl Serialize for ByteSize {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bytes(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bytes(n) => Ok(ByteSize(n)),
            Raw::Text(s) => ByteSize::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}
