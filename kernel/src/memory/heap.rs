//! Boot heap
//!
//! The process pools never allocate; the heap only backs the serial input
//! queues created once during boot. It lives in a static array, so no
//! page mapping is needed.

use linked_list_allocator::LockedHeap;

pub const HEAP_SIZE: usize = 64 * 1024;

#[repr(align(16))]
struct HeapArea([u8; HEAP_SIZE]);

static mut HEAP_AREA: HeapArea = HeapArea([0; HEAP_SIZE]);

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Hand the static heap area to the allocator. Call exactly once, before
/// anything allocates.
pub fn init() {
    // SAFETY: called once during single-threaded boot; HEAP_AREA is never
    // touched except through the allocator afterwards.
    unsafe {
        let start = core::ptr::addr_of_mut!(HEAP_AREA) as *mut u8;
        ALLOCATOR.lock().init(start, HEAP_SIZE);
    }
    log::info!("heap: {} KiB boot heap ready", HEAP_SIZE / 1024);
}
