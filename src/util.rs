//! Internal utilities.

use std::ffi::CString;

/// Looks up the kernel index of the interface named `name`.
///
/// Returns `None` if no such interface exists (or the name contains a NUL).
#[must_use]
pub fn interface_index(name: &str) -> Option<u32> {
    let c_name = CString::new(name).ok()?;
    // SAFETY: `if_nametoindex` only reads the NUL-terminated string.
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
    (index != 0).then_some(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_interface_has_no_index() {
        assert_eq!(interface_index("nosuchif0"), None);
    }

    #[test]
    fn nul_in_name_has_no_index() {
        assert_eq!(interface_index("lo\0"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn loopback_has_index() {
        assert!(interface_index("lo").is_some());
    }
}
