//! Logging macros taking a message template and positional arguments.
//!
//! Arguments bind to the template's holes in order and are converted with
//! `PropertyValue::from`, so named holes become event properties.
//!
//! # Examples
//!
//! ```
//! use rust_log_router::prelude::*;
//! use rust_log_router::info;
//!
//! # fn main() -> rust_log_router::Result<()> {
//! let router = Router::builder()
//!     .sink(ConsoleWriter::new(), LogLevel::Information)
//!     .build();
//!
//! info!(router, "Server started")?;
//!
//! let port = 8080;
//! info!(router, "Server listening on port {Port}", port)?;
//!
//! let user_id = 42;
//! info!(router, "User {UserId} performed {Action}", user_id, "login")?;
//! # Ok(())
//! # }
//! ```

/// Log a template at an explicit level.
///
/// ```
/// # use rust_log_router::prelude::*;
/// # let router = Router::builder().build();
/// use rust_log_router::log;
/// log!(router, LogLevel::Information, "Simple message").unwrap();
/// log!(router, LogLevel::Error, "Error code: {Code}", 500).unwrap();
/// ```
#[macro_export]
macro_rules! log {
    ($router:expr, $level:expr, $template:expr $(, $arg:expr)* $(,)?) => {
        $router.emit(
            $level,
            $template,
            vec![$($crate::PropertyValue::from($arg)),*],
            $crate::Properties::new(),
        )
    };
}

#[macro_export]
macro_rules! trace {
    ($router:expr, $($arg:tt)+) => {
        $crate::log!($router, $crate::LogLevel::Trace, $($arg)+)
    };
}

#[macro_export]
macro_rules! debug {
    ($router:expr, $($arg:tt)+) => {
        $crate::log!($router, $crate::LogLevel::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($router:expr, $($arg:tt)+) => {
        $crate::log!($router, $crate::LogLevel::Information, $($arg)+)
    };
}

#[macro_export]
macro_rules! warn {
    ($router:expr, $($arg:tt)+) => {
        $crate::log!($router, $crate::LogLevel::Warning, $($arg)+)
    };
}

#[macro_export]
macro_rules! error {
    ($router:expr, $($arg:tt)+) => {
        $crate::log!($router, $crate::LogLevel::Error, $($arg)+)
    };
}

#[macro_export]
macro_rules! fatal {
    ($router:expr, $($arg:tt)+) => {
        $crate::log!($router, $crate::LogLevel::Fatal, $($arg)+)
    };
}
