//! Platform fault errors and the well-known fault-code table.

use super::value::ErrorValue;
use super::ErrorMessage;
use crate::consts::FAULT_DESCRIPTION;
use crate::severity::Severity;
use std::fmt;

/// Breakpoint instruction hit.
pub const STATUS_BREAKPOINT: u32 = 0x8000_0003;
/// Read/write of an inaccessible address.
pub const STATUS_ACCESS_VIOLATION: u32 = 0xC000_0005;
/// Floating-point division by zero.
pub const STATUS_FLOAT_DIVIDE_BY_ZERO: u32 = 0xC000_008E;
/// Integer division by zero.
pub const STATUS_INTEGER_DIVIDE_BY_ZERO: u32 = 0xC000_0094;
/// Thread stack exhausted.
pub const STATUS_STACK_OVERFLOW: u32 = 0xC000_00FD;

/// Reserved code: an abstract operation was called with no implementation bound.
///
/// Translated into an assertion failure rather than a platform fault.
pub const FAULT_PURE_VIRTUAL_CALL: u32 = 0xE000_6025;

/// Label for a well-known fault code. Deliberately a closed whitelist.
pub const fn fault_label(code: u32) -> Option<&'static str> {
    match code {
        STATUS_BREAKPOINT => Some("Breakpoint"),
        STATUS_ACCESS_VIOLATION => Some("Access Violation"),
        STATUS_FLOAT_DIVIDE_BY_ZERO => Some("Float: Divide by Zero"),
        STATUS_INTEGER_DIVIDE_BY_ZERO => Some("Integer: Divide by Zero"),
        STATUS_STACK_OVERFLOW => Some("Stack Overflow"),
        _ => None,
    }
}

/// Fault delivered by the operating system as a native structured exception.
///
/// `address` is the faulting instruction address relative to the program's
/// code base, so it can be looked up in the link map of any run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaultError {
    base: ErrorValue,
    address: usize,
}

impl FaultError {
    /// Create a fault error from a native fault code and a normalized address.
    pub const fn new(code: u32, address: usize) -> Self {
        Self {
            base: ErrorValue::new(Severity::Fatal, code, FAULT_DESCRIPTION),
            address,
        }
    }

    /// Faulting address relative to the code base.
    #[inline]
    pub const fn address(&self) -> usize {
        self.address
    }

    /// Well-known label for the code, if any.
    #[inline]
    pub fn label(&self) -> Option<&'static str> {
        fault_label(self.base.code())
    }

    /// The underlying error value.
    pub const fn base(&self) -> &ErrorValue {
        &self.base
    }
}

impl ErrorMessage for FaultError {
    fn severity(&self) -> Severity {
        self.base.severity()
    }

    fn code(&self) -> u32 {
        self.base.code()
    }

    fn write_message(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        match self.label() {
            Some(label) => write!(out, "\"{}\" (0x{:x})", label, self.address),
            None => write!(out, "code=0x{:x}, (0x{:x})", self.code(), self.address),
        }
    }
}

impl fmt::Display for FaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_message(f)
    }
}
