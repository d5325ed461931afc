//! Ordered severity shared by error values and log lines.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// How serious an error or log line is.
///
/// The discriminant is the server's numeric priority: a lower number is more
/// severe, and that number is what rendered messages print (`Pri=1`).
/// [`Ord`] follows seriousness, so `Severity::Fatal > Severity::Warn`.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Severity {
    /// The process cannot continue.
    Fatal = 1,
    /// A broken invariant; the process should shut down.
    Critical = 2,
    /// A failed operation the server can log and survive.
    Error = 3,
    /// A potentially problematic situation.
    Warn = 4,
    /// Normal operational event.
    #[default]
    Event = 5,
    /// Verbose diagnostics.
    Trace = 6,
}

impl Severity {
    /// Numeric priority printed in rendered messages.
    #[inline]
    pub const fn priority(self) -> u8 {
        self as u8
    }

    /// Convert from a raw priority. Returns `None` for values outside `1..=6`.
    #[inline]
    pub const fn from_priority(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Fatal),
            2 => Some(Self::Critical),
            3 => Some(Self::Error),
            4 => Some(Self::Warn),
            5 => Some(Self::Event),
            6 => Some(Self::Trace),
            _ => None,
        }
    }

    /// Returns true if an error of this severity must end the process.
    #[inline]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::Fatal | Self::Critical)
    }

    /// Tracing level used when this severity is logged.
    pub const fn as_level(self) -> tracing::Level {
        match self {
            Self::Fatal | Self::Critical | Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Event => tracing::Level::INFO,
            Self::Trace => tracing::Level::TRACE,
        }
    }

    /// Lowercase name, matching the serde representation.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fatal => "fatal",
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Event => "event",
            Self::Trace => "trace",
        }
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        other.priority().cmp(&self.priority())
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Severity> for tracing::Level {
    fn from(severity: Severity) -> Self {
        severity.as_level()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_seriousness() {
        assert!(Severity::Fatal > Severity::Critical);
        assert!(Severity::Critical > Severity::Error);
        assert!(Severity::Error > Severity::Warn);
        assert!(Severity::Warn > Severity::Event);
        assert!(Severity::Event > Severity::Trace);
        assert_eq!(Severity::Fatal.max(Severity::Trace), Severity::Fatal);
    }

    #[test]
    fn priority_round_trip() {
        for p in 1..=6 {
            let sev = Severity::from_priority(p).unwrap();
            assert_eq!(sev.priority(), p);
        }
        assert_eq!(Severity::from_priority(0), None);
        assert_eq!(Severity::from_priority(7), None);
    }

    #[test]
    fn fatal_classification() {
        assert!(Severity::Fatal.is_fatal());
        assert!(Severity::Critical.is_fatal());
        assert!(!Severity::Error.is_fatal());
        assert!(!Severity::Trace.is_fatal());
    }

    #[test]
    fn tracing_level_mapping() {
        assert_eq!(tracing::Level::from(Severity::Fatal), tracing::Level::ERROR);
        assert_eq!(tracing::Level::from(Severity::Warn), tracing::Level::WARN);
        assert_eq!(tracing::Level::from(Severity::Event), tracing::Level::INFO);
    }

    #[test]
    fn severity_deserialization() {
        #[derive(Debug, Deserialize)]
        struct Wrapper {
            level: Severity,
        }

        let w: Wrapper = toml::from_str("level = \"critical\"").unwrap();
        assert_eq!(w.level, Severity::Critical);
        let w: Wrapper = toml::from_str("level = \"event\"").unwrap();
        assert_eq!(w.level, Severity::Event);
        assert!(toml::from_str::<Wrapper>("level = \"loud\"").is_err());
    }
}
