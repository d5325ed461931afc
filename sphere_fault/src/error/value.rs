//! Base error value: severity, code, description.

use super::{render_with, ErrorMessage, RenderError};
use crate::consts::CODE_STATUS_BIT;
use crate::error::system::system_message;
use crate::severity::Severity;
use std::fmt::{self, Write as _};

/// Immutable error value.
///
/// `code == 0` means "no code". A code with the top bit set is a platform
/// status value and renders in hexadecimal; any other code renders in decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorValue {
    severity: Severity,
    code: u32,
    description: &'static str,
}

impl ErrorValue {
    /// Create a new error value.
    pub const fn new(severity: Severity, code: u32, description: &'static str) -> Self {
        Self {
            severity,
            code,
            description,
        }
    }

    /// Description text.
    #[inline]
    pub const fn description(&self) -> &'static str {
        self.description
    }

    /// Returns true if the code is a platform status value.
    #[inline]
    pub const fn is_status_code(&self) -> bool {
        self.code & CODE_STATUS_BIT != 0
    }

    fn write_code(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        if self.is_status_code() {
            write!(out, "0x{:x}", self.code)
        } else {
            write!(out, "{}", self.code)
        }
    }

    /// Render with `os_text` embedded after the code:
    /// `Error Pri=<p>, Code=<code>(<os_text>), Desc='<desc>'`.
    pub fn render_with_os_text<const N: usize>(
        &self,
        buf: &mut heapless::String<N>,
        os_text: &str,
    ) -> Result<(), RenderError> {
        render_with(buf, |out| {
            write!(out, "Error Pri={}, Code=", self.severity.priority())?;
            self.write_code(out)?;
            write!(out, "({}), Desc='{}'", os_text, self.description)
        })
    }

    /// Render, embedding the OS message for the code when the platform has one.
    ///
    /// Falls back to [`ErrorMessage::render`] for code 0 or unknown codes.
    pub fn render_with_system_message<const N: usize>(
        &self,
        buf: &mut heapless::String<N>,
    ) -> Result<(), RenderError> {
        if self.code != 0 {
            if let Some(message) = system_message(self.code) {
                return self.render_with_os_text(buf, &message);
            }
        }
        self.render(buf)
    }
}

impl ErrorMessage for ErrorValue {
    fn severity(&self) -> Severity {
        self.severity
    }

    fn code(&self) -> u32 {
        self.code
    }

    fn write_message(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        write!(out, "Error Pri={}, Code=", self.severity.priority())?;
        self.write_code(out)?;
        write!(out, ", Desc='{}'", self.description)
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_message(f)
    }
}

static_assertions::assert_impl_all!(ErrorValue: Copy, Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorText;

    fn rendered(err: &ErrorValue) -> ErrorText {
        let mut text = ErrorText::new();
        err.render(&mut text).unwrap();
        text
    }

    #[test]
    fn zero_code_renders_decimal() {
        let err = ErrorValue::new(Severity::Warn, 0, "no code");
        assert_eq!(rendered(&err).as_str(), "Error Pri=4, Code=0, Desc='no code'");
    }

    #[test]
    fn top_bit_code_renders_hex() {
        let err = ErrorValue::new(Severity::Fatal, 0x8000_0000, "status");
        assert!(err.is_status_code());
        assert_eq!(
            rendered(&err).as_str(),
            "Error Pri=1, Code=0x80000000, Desc='status'"
        );
    }

    #[test]
    fn largest_decimal_code() {
        let err = ErrorValue::new(Severity::Error, 0x7fff_ffff, "max");
        assert!(!err.is_status_code());
        assert_eq!(
            rendered(&err).as_str(),
            "Error Pri=3, Code=2147483647, Desc='max'"
        );
    }

    #[test]
    fn os_text_is_embedded() {
        let err = ErrorValue::new(Severity::Error, 2, "open world file");
        let mut text = ErrorText::new();
        err.render_with_os_text(&mut text, "No such file or directory")
            .unwrap();
        assert_eq!(
            text.as_str(),
            "Error Pri=3, Code=2(No such file or directory), Desc='open world file'"
        );
    }

    #[test]
    fn os_text_with_status_code() {
        let err = ErrorValue::new(Severity::Critical, 0xC000_0005, "status");
        let mut text = ErrorText::new();
        err.render_with_os_text(&mut text, "denied").unwrap();
        assert_eq!(text.as_str(), "Error Pri=2, Code=0xc0000005(denied), Desc='status'");
    }

    #[test]
    fn zero_code_skips_system_message() {
        let err = ErrorValue::new(Severity::Event, 0, "idle");
        let mut text = ErrorText::new();
        err.render_with_system_message(&mut text).unwrap();
        assert_eq!(text.as_str(), "Error Pri=5, Code=0, Desc='idle'");
    }

    #[cfg(unix)]
    #[test]
    fn errno_code_embeds_system_message() {
        let err = ErrorValue::new(Severity::Error, libc::ENOENT as u32, "load");
        let mut text = ErrorText::new();
        err.render_with_system_message(&mut text).unwrap();
        assert!(text.starts_with("Error Pri=3, Code=2("));
        assert!(text.ends_with("), Desc='load'"));
    }

    #[test]
    fn buffer_too_small_leaves_buffer_empty() {
        let err = ErrorValue::new(Severity::Error, 1, "a description that is long");
        let mut small = heapless::String::<16>::new();
        small.push_str("stale").unwrap();
        assert_eq!(
            err.render(&mut small),
            Err(RenderError::BufferTooSmall { capacity: 16 })
        );
        assert!(small.is_empty());
    }

    #[test]
    fn display_matches_render() {
        let err = ErrorValue::new(Severity::Trace, 42, "tick");
        assert_eq!(err.to_string(), rendered(&err).as_str());
    }
}
