//! Program image base, used to normalize faulting addresses.
//!
//! The base is resolved once and cached. A faulting address minus the base
//! matches the offsets in the program's link map regardless of where the
//! loader placed the image.

use std::sync::OnceLock;

static IMAGE_BASE: OnceLock<usize> = OnceLock::new();

/// Load address of the image containing this crate (0 if unknown).
pub fn image_base() -> usize {
    *IMAGE_BASE.get_or_init(resolve_image_base)
}

/// Resolve and cache the image base ahead of time.
///
/// Call during startup so handlers never do the lookup themselves.
pub fn init() -> usize {
    image_base()
}

/// `address` relative to [`image_base`].
#[inline]
pub fn relative_address(address: usize) -> usize {
    address.wrapping_sub(image_base())
}

#[cfg(unix)]
fn resolve_image_base() -> usize {
    let anchor = resolve_image_base as *const libc::c_void;
    let mut info = std::mem::MaybeUninit::<libc::Dl_info>::zeroed();
    // SAFETY: `anchor` is an address inside this image; `info` is writable.
    let found = unsafe { libc::dladdr(anchor, info.as_mut_ptr()) };
    if found == 0 {
        tracing::warn!("dladdr could not resolve the image base, addresses stay absolute");
        return 0;
    }
    // SAFETY: dladdr filled `info` on success.
    let info = unsafe { info.assume_init() };
    info.dli_fbase as usize
}

#[cfg(windows)]
fn resolve_image_base() -> usize {
    #[link(name = "kernel32")]
    unsafe extern "system" {
        fn GetModuleHandleW(module_name: *const u16) -> *mut std::ffi::c_void;
    }
    // SAFETY: a null name asks for the handle of the executable, which is its base.
    unsafe { GetModuleHandleW(std::ptr::null()) as usize }
}

#[cfg(not(any(unix, windows)))]
fn resolve_image_base() -> usize {
    0
}
