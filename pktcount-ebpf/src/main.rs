#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU64, Ordering};

use aya_ebpf::{
    bindings::xdp_action,
    macros::{map, xdp},
    maps::Array,
    programs::XdpContext,
};
use pktcount_common::{COUNTER_ENTRIES, COUNTER_KEY};

/// Packets seen on the interface this instance is attached to.
#[map]
static PKT_COUNT: Array<u64> = Array::with_max_entries(COUNTER_ENTRIES, 0);

#[xdp]
pub fn count_packets(_ctx: XdpContext) -> u32 {
    if let Some(count) = PKT_COUNT.get_ptr_mut(COUNTER_KEY) {
        // The cell is shared by every CPU handling this interface.
        let count = unsafe { AtomicU64::from_ptr(count) };
        count.fetch_add(1, Ordering::Relaxed);
    }
    xdp_action::XDP_PASS
}

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
