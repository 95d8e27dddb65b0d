use core::fmt;

/// The key passed to a keyed accessor or `remove` is not in the map.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LookupError;

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("key not found")
    }
}

impl std::error::Error for LookupError {}
