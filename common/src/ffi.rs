//! The repr(C) boundary between instrumented IR and the runtime library.
//!
//! The instrumentation engine emits one `SiteInfo` as a file-local constant
//! per instrumented call site (mirroring how front ends emit one debug
//! metadata node per source location) and passes a pointer to it into the
//! runtime's report functions alongside the kind-specific payload.

use crate::report::SourceLocation;

/// A borrowed, possibly absent, UTF-8 string: `ptr` is null when absent.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct FfiStr {
    pub ptr: *const u8,
    pub len: usize,
}

impl FfiStr {
    pub const fn empty() -> Self {
        Self {
            ptr: std::ptr::null(),
            len: 0,
        }
    }

    /// # Safety
    /// `ptr` must either be null or point to at least `len` valid,
    /// initialized UTF-8 bytes that outlive this call.
    pub unsafe fn as_str(&self) -> Option<&str> {
        if self.ptr.is_null() {
            return None;
        }
        let slice = std::slice::from_raw_parts(self.ptr, self.len);
        std::str::from_utf8(slice).ok()
    }
}

/// Static per-call-site location, constructed once by the instrumentation
/// engine and referenced by every dynamic execution of that site.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct SiteInfo {
    pub file: FfiStr,
    pub line: u32,
    pub function: FfiStr,
}

impl SiteInfo {
    pub const UNKNOWN: SiteInfo = SiteInfo {
        file: FfiStr::empty(),
        line: 0,
        function: FfiStr::empty(),
    };

    /// # Safety
    /// `site` must be null or point to a valid, live `SiteInfo` whose
    /// `FfiStr` fields satisfy [`FfiStr::as_str`]'s safety requirement.
    pub unsafe fn read(site: *const SiteInfo) -> Option<SourceLocation> {
        let site = site.as_ref()?;
        let file = site.file.as_str()?;
        let function = site.function.as_str()?;
        Some(SourceLocation {
            file: file.to_string(),
            line: site.line,
            function: function.to_string(),
        })
    }
}
