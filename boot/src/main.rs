#![no_std]
#![no_main]

//! Firmware image entry points
//!
//! The architecture startup code sets up the stack and exception vectors,
//! then calls [`scp_main`]. External interrupts arrive at
//! [`scp_handle_interrupt`].

use core::panic::PanicInfo;

use conquer_once::spin::OnceCell;
use spin::Mutex;

use scp_kernel::mmio::Mmio;
use scp_kernel::platform::Platform;
use scp_kernel::{serial, serial_println, Scp};

#[cfg(feature = "sun50i-a64")]
use scp_kernel::platform::sun50i_a64::A64Platform as PlatformImpl;

#[cfg(not(feature = "sun50i-a64"))]
compile_error!("no platform selected; enable one of the platform features");

static FIRMWARE: OnceCell<Mutex<Scp<PlatformImpl>>> = OnceCell::uninit();

fn firmware() -> &'static Mutex<Scp<PlatformImpl>> {
    FIRMWARE.get_or_init(|| {
        let platform = PlatformImpl::new(Mmio);
        let css = platform.css();
        Mutex::new(Scp::new(platform, css))
    })
}

/// `exception` is the vector that got us here: zero for a cold or warm
/// boot, anything else for an unexpected exception that restarted the
/// firmware.
#[no_mangle]
pub extern "C" fn scp_main(exception: u32) -> ! {
    serial::init_logger();
    if exception != 0 {
        log::warn!("Restarted by unhandled exception {}", exception);
    }

    let watchdog = {
        let mut scp = firmware().lock();
        scp.init();
        scp.watchdog()
    };

    loop {
        watchdog.restart();
        core::hint::spin_loop();
    }
}

#[no_mangle]
pub extern "C" fn scp_handle_interrupt() {
    // Held only by `scp_main` during init, before interrupts are unmasked.
    if let Some(mut scp) = firmware().try_lock() {
        scp.handle_interrupt();
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    serial_println!("SCP: panic: {}", info);

    if let Some(mut scp) = FIRMWARE.get().and_then(Mutex::try_lock) {
        scp.fatal("panic");
    }
    PlatformImpl::new(Mmio).restart()
}
