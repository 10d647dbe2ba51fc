//! Leveled logging facade with a swappable backend.
//!
//! Generalizes `slopos_lib::klog`: instead of a fixed kernel console sink,
//! the backend is a plain function pointer stored in an `AtomicPtr<()>` and
//! swapped in by the host at startup (a hosted test harness installs one
//! that writes to stdout; a bare-metal build installs one that writes to a
//! UART). No heap, no `dyn Trait` — the same trade `klog` makes.

use core::fmt::Arguments;
use core::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

/// Severity of a log record, most to least severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

type BackendFn = fn(LogLevel, Arguments<'_>);

fn default_backend(_level: LogLevel, _args: Arguments<'_>) {
    // No sink installed: records are silently dropped, same as `klog`
    // before `set_backend` is called.
}

static BACKEND: AtomicPtr<()> = AtomicPtr::new(default_backend as *mut ());
static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Install the function that receives every log record passing the current
/// level filter.
pub fn set_backend(backend: BackendFn) {
    BACKEND.store(backend as *mut (), Ordering::Release);
}

/// Reset to the no-op backend.
pub fn clear_backend() {
    BACKEND.store(default_backend as *mut (), Ordering::Release);
}

/// Set the minimum level that reaches the backend.
pub fn set_level(level: LogLevel) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Whether `level` currently passes the filter (check before building
/// expensive `Arguments` at hot call sites).
#[inline]
pub fn is_enabled(level: LogLevel) -> bool {
    level as u8 <= LEVEL.load(Ordering::Relaxed)
}

/// Format and dispatch a record to the installed backend, if `level`
/// passes the filter.
pub fn log_args(level: LogLevel, args: Arguments<'_>) {
    if !is_enabled(level) {
        return;
    }
    // SAFETY: only ever stores function pointers of type `BackendFn`, set
    // via `set_backend`/`clear_backend` above.
    let backend: BackendFn = unsafe { core::mem::transmute(BACKEND.load(Ordering::Acquire)) };
    backend(level, args);
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::log::log_args($crate::log::LogLevel::Error, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::log::log_args($crate::log::LogLevel::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::log::log_args($crate::log::LogLevel::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::log::log_args($crate::log::LogLevel::Debug, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        $crate::log::log_args($crate::log::LogLevel::Trace, format_args!($($arg)*))
    };
}
