//! OS-native error message lookup.
//!
//! Windows resolves codes through `FormatMessageA`; Unix resolves codes in the
//! errno range. Messages are trimmed of trailing line terminators and copied
//! into a bounded buffer.

use crate::consts::SYSTEM_MESSAGE_CAPACITY;

/// Bounded OS message text.
pub type SystemMessage = heapless::String<SYSTEM_MESSAGE_CAPACITY>;

/// Trim trailing CR/LF and copy at most `SYSTEM_MESSAGE_CAPACITY` bytes,
/// stopping at a character boundary.
pub fn trim_message(raw: &str) -> SystemMessage {
    let trimmed = raw.trim_end_matches(['\r', '\n']);
    let mut out = SystemMessage::new();
    for ch in trimmed.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

/// Look up the OS message for `code`. Returns `None` if the platform has none.
#[cfg(unix)]
pub fn system_message(code: u32) -> Option<SystemMessage> {
    use crate::consts::CODE_STATUS_BIT;
    use nix::errno::Errno;

    if code == 0 || code & CODE_STATUS_BIT != 0 {
        return None;
    }
    let errno = Errno::from_raw(code as i32);
    if errno == Errno::UnknownErrno {
        return None;
    }
    Some(trim_message(errno.desc()))
}

/// Look up the OS message for `code`. Returns `None` if the platform has none.
#[cfg(windows)]
pub fn system_message(code: u32) -> Option<SystemMessage> {
    use std::ffi::c_void;

    const FORMAT_MESSAGE_IGNORE_INSERTS: u32 = 0x0000_0200;
    const FORMAT_MESSAGE_FROM_SYSTEM: u32 = 0x0000_1000;
    const LANG_NEUTRAL: u32 = 0;

    #[link(name = "kernel32")]
    unsafe extern "system" {
        fn FormatMessageA(
            flags: u32,
            source: *const c_void,
            message_id: u32,
            language_id: u32,
            buffer: *mut u8,
            size: u32,
            arguments: *const c_void,
        ) -> u32;
    }

    if code == 0 {
        return None;
    }
    let mut raw = [0u8; SYSTEM_MESSAGE_CAPACITY];
    // SAFETY: `raw` is a writable buffer of the advertised size; no inserts are expanded.
    let written = unsafe {
        FormatMessageA(
            FORMAT_MESSAGE_FROM_SYSTEM | FORMAT_MESSAGE_IGNORE_INSERTS,
            std::ptr::null(),
            code,
            LANG_NEUTRAL,
            raw.as_mut_ptr(),
            raw.len() as u32,
            std::ptr::null(),
        )
    } as usize;
    if written == 0 {
        return None;
    }
    let text = String::from_utf8_lossy(&raw[..written.min(raw.len())]);
    Some(trim_message(&text))
}

/// Look up the OS message for `code`. Returns `None` if the platform has none.
#[cfg(not(any(unix, windows)))]
pub fn system_message(_code: u32) -> Option<SystemMessage> {
    None
}
