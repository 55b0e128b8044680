//! Symbolic labels for the enumerated codes carried by UVM records.
//!
//! The producer's code set can grow independently of this tool, so every
//! mapping here is total: codes we do not know about become `Unknown`.

use std::fmt;

/// How pages were moved by a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferMode {
    Move,
    Copy,
    Unknown,
}

impl TransferMode {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Move,
            2 => Self::Copy,
            _ => Self::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Move => "Move",
            Self::Copy => "Copy",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Why a migration happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCause {
    ReplayableFault,
    NonReplayableFault,
    AccessCounter,
    Prefetch,
    Eviction,
    ApiTools,
    ApiMigrate,
    ApiSetRangeGroup,
    ApiHint,
    Unknown,
}

impl FaultCause {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::ReplayableFault,
            1 => Self::NonReplayableFault,
            2 => Self::AccessCounter,
            3 => Self::Prefetch,
            4 => Self::Eviction,
            5 => Self::ApiTools,
            6 => Self::ApiMigrate,
            7 => Self::ApiSetRangeGroup,
            8 => Self::ApiHint,
            _ => Self::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ReplayableFault => "ReplayableFault",
            Self::NonReplayableFault => "NonReplayableFault",
            Self::AccessCounter => "AccessCounter",
            Self::Prefetch => "Prefetch",
            Self::Eviction => "Eviction",
            Self::ApiTools => "ApiTools",
            Self::ApiMigrate => "ApiMigrate",
            Self::ApiSetRangeGroup => "ApiSetRangeGroup",
            Self::ApiHint => "ApiHint",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for FaultCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}
