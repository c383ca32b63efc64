//! Operator interrupt handling.
//!
//! A SIGINT must terminate any in-flight child process (and descendants
//! spawned by a wrapping diagnostic tool) before the grader itself exits.
//! The runner registers the active child's process group here; the ctrl-c
//! handler kills it and exits with the interrupt code.

use std::sync::Mutex;

/// 128 + SIGINT, the reserved interrupt exit range.
pub const INTERRUPT_EXIT_CODE: i32 = 130;

static ACTIVE_CHILD: Mutex<Option<u32>> = Mutex::new(None);

/// Install the interrupt handler. Call once, early in `main`.
pub fn install() {
    let _ = ctrlc::set_handler(|| {
        kill_active_child();
        std::process::exit(INTERRUPT_EXIT_CODE);
    });
}

pub(crate) fn register_child(pid: u32) {
    if let Ok(mut guard) = ACTIVE_CHILD.lock() {
        *guard = Some(pid);
    }
}

pub(crate) fn clear_child() {
    if let Ok(mut guard) = ACTIVE_CHILD.lock() {
        *guard = None;
    }
}

fn kill_active_child() {
    let pid = match ACTIVE_CHILD.lock() {
        Ok(guard) => *guard,
        Err(_) => None,
    };
    if let Some(pid) = pid {
        kill_group(pid);
    }
}

/// Kill a child's whole process group so wrapper-tool descendants die too.
#[cfg(unix)]
pub(crate) fn kill_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;
    let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
}

#[cfg(not(unix))]
pub(crate) fn kill_group(_pid: u32) {}
