//! Access to buffers passed in by processes.
//!
//! Processes share the kernel's flat address space, so a user pointer is
//! used as-is once it is known to be non-null.

/// Borrow `len` bytes at `addr`.
///
/// # Safety
/// `addr..addr + len` must be readable memory that is not mutated while the
/// slice is alive.
pub unsafe fn user_slice<'a>(addr: u64, len: usize) -> Option<&'a [u8]> {
    if addr == 0 {
        return None;
    }
    Some(core::slice::from_raw_parts(addr as *const u8, len))
}

/// Mutably borrow `len` bytes at `addr`.
///
/// # Safety
/// `addr..addr + len` must be writable memory not aliased elsewhere while
/// the slice is alive.
pub unsafe fn user_slice_mut<'a>(addr: u64, len: usize) -> Option<&'a mut [u8]> {
    if addr == 0 {
        return None;
    }
    Some(core::slice::from_raw_parts_mut(addr as *mut u8, len))
}

/// Borrow a NUL-terminated string at `addr`, without the terminator.
///
/// At most `max` bytes are scanned; an unterminated string is cut there.
///
/// # Safety
/// Every byte from `addr` up to the terminator, or `max` bytes, must be
/// readable.
pub unsafe fn user_cstr<'a>(addr: u64, max: usize) -> Option<&'a [u8]> {
    if addr == 0 {
        return None;
    }
    let base = addr as *const u8;
    let mut len = 0;
    while len < max && *base.add(len) != 0 {
        len += 1;
    }
    Some(core::slice::from_raw_parts(base, len))
}
