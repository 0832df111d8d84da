use std::fmt;
use crate::core::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogId(pub u64);

impl LogId {
    pub fn new(id: u64) -> Self {
        LogId(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for LogId {
    fn from(id: u64) -> Self {
        LogId(id)
    }
}

/// Rendered as fixed-width hex; storage keys and backend paths depend on it.
impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Kind of text held by a sub-chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogType {
    Text,
    /// One JSON event per line; only the human-readable message is indexed
    Structured,
}

impl LogType {
    pub fn to_i32(self) -> i32 {
        match self {
            LogType::Text => 0,
            LogType::Structured => 1,
        }
    }

    pub fn from_i32(value: i32) -> Result<Self> {
        match value {
            0 => Ok(LogType::Text),
            1 => Ok(LogType::Structured),
            other => Err(Error::format(format!("unknown log type {}", other))),
        }
    }
}
