use std::ffi::{c_char, CStr, CString};

/// Utility functions commonly used
pub mod align;
pub use align::align;

/// Copies a nul-terminated C string into an owned [`CString`]. Null pointers become empty.
///
/// # Safety
/// `c` must be null or point to a valid nul-terminated string.
pub unsafe fn wrap_c_str(c: *const c_char) -> CString {
    if c.is_null() {
        CString::default()
    } else {
        unsafe { CStr::from_ptr(c) }.to_owned()
    }
}

/// Returns the first name in `requested` which is absent from `available`
pub fn first_missing<'a>(available: &[&CStr], requested: &'a [CString]) -> Option<&'a CString> {
    requested
        .iter()
        .find(|request| !available.iter().any(|name| *name == request.as_c_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_pointer_is_empty() {
        assert_eq!(unsafe { wrap_c_str(std::ptr::null()) }, CString::default());
    }

    #[test]
    fn finds_missing_name() {
        let available = [c"VK_KHR_surface", c"VK_KHR_xcb_surface"];
        let requested = vec![
            CString::from(c"VK_KHR_surface"),
            CString::from(c"VK_EXT_debug_utils"),
        ];
        assert_eq!(
            first_missing(&available, &requested),
            Some(&CString::from(c"VK_EXT_debug_utils"))
        );
        assert_eq!(first_missing(&available, &requested[..1]), None);
    }
}
