//! Logging shims.
//!
//! With the `log` feature the macros forward to the `log` facade. Without it, the arguments are
//! still evaluated by reference so that a disabled log statement neither changes borrowck results
//! nor provokes unused variable warnings, but no formatting code is ever linked.

#[cfg(feature = "log")]
macro_rules! net_log {
    (trace, $($arg:expr),*) => { log::trace!($($arg),*); };
    (debug, $($arg:expr),*) => { log::debug!($($arg),*); };
    (warn, $($arg:expr),*) => { log::warn!($($arg),*); };
    (error, $($arg:expr),*) => { log::error!($($arg),*); };
}

#[cfg(not(feature = "log"))]
macro_rules! net_log {
    ($level:ident, $($arg:expr),*) => { $( let _ = &$arg; )* }
}

macro_rules! net_trace {
    ($($arg:expr),*) => (net_log!(trace, $($arg),*));
}

macro_rules! net_debug {
    ($($arg:expr),*) => (net_log!(debug, $($arg),*));
}

macro_rules! net_warn {
    ($($arg:expr),*) => (net_log!(warn, $($arg),*));
}

macro_rules! net_error {
    ($($arg:expr),*) => (net_log!(error, $($arg),*));
}
