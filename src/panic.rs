//! Formatting of panic payloads caught from event handlers.

use std::{any::Any, fmt};

/// Displays a caught panic payload.
///
/// `String` and `&'static str` payloads print as their text; anything else
/// falls back to `Debug` formatting.
///
/// ```
/// use devicewire::panic::format_panic;
///
/// let caught = std::panic::catch_unwind(|| panic!("handler failed")).unwrap_err();
/// assert_eq!(format_panic(caught).to_string(), "handler failed");
/// assert!(format_panic(Box::new(5_u32)).to_string().contains("Any"));
/// ```
#[derive(Debug)]
#[must_use]
pub struct PanicMessage(Box<dyn Any + Send>);

impl PanicMessage {
    /// The payload text, if it was a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.0
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| self.0.downcast_ref::<&'static str>().copied())
    }
}

impl fmt::Display for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(text) => f.write_str(text),
            None => write!(f, "{:?}", self.0),
        }
    }
}

/// Wrap a payload returned by [`std::panic::catch_unwind`].
pub fn format_panic(panic: Box<dyn Any + Send>) -> PanicMessage { PanicMessage(panic) }
