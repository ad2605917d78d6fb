/// Domain-aware logging macros.
///
/// Each macro injects a `domain` field automatically so callers never need
/// to remember the string literal. Domains in use: `sys` (lifecycle),
/// `pipe` (per-row processing), `conf` (configuration), `res` (resources).
///
/// ```ignore
/// sl_info!(sys, stages = 8, "pipeline started");
/// sl_warn!(pipe, error = %e, "predicate failed, row dropped");
/// ```

/// Internal helper. Do not call directly; use `sl_error!` through `sl_trace!`.
#[doc(hidden)]
macro_rules! sl_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

#[allow(unused_macros)]
macro_rules! sl_error {
    ($domain:ident, $($rest:tt)*) => {
        sl_log!(error, $domain, $($rest)*)
    };
}

macro_rules! sl_warn {
    ($domain:ident, $($rest:tt)*) => {
        sl_log!(warn, $domain, $($rest)*)
    };
}

macro_rules! sl_info {
    ($domain:ident, $($rest:tt)*) => {
        sl_log!(info, $domain, $($rest)*)
    };
}

macro_rules! sl_debug {
    ($domain:ident, $($rest:tt)*) => {
        sl_log!(debug, $domain, $($rest)*)
    };
}

#[allow(unused_macros)]
macro_rules! sl_trace {
    ($domain:ident, $($rest:tt)*) => {
        sl_log!(trace, $domain, $($rest)*)
    };
}
