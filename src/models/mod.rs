pub mod device;
pub mod filesystem;
pub mod io;
pub mod raid;
pub mod snapshot;

use serde::{Serialize, Serializer};

/// A byte quantity that may not have been measured.
///
/// `Unavailable` means "not computed" and is distinct from a measured zero;
/// it serializes as JSON `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteCount {
    #[default]
    Unavailable,
    Bytes(u64),
}

impl ByteCount {
    pub fn bytes(self) -> Option<u64> {
        match self {
            ByteCount::Bytes(b)    => Some(b),
            ByteCount::Unavailable => None,
        }
    }

    pub fn is_available(self) -> bool { self.bytes().is_some() }
}

impl From<Option<u64>> for ByteCount {
    fn from(v: Option<u64>) -> Self {
        v.map_or(ByteCount::Unavailable, ByteCount::Bytes)
    }
}

impl Serialize for ByteCount {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            ByteCount::Bytes(b)    => s.serialize_u64(*b),
            ByteCount::Unavailable => s.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_differs_from_zero() {
        assert_ne!(ByteCount::Unavailable, ByteCount::Bytes(0));
        assert_eq!(serde_json::to_value(ByteCount::Unavailable).unwrap(), serde_json::Value::Null);
        assert_eq!(serde_json::to_value(ByteCount::Bytes(0)).unwrap(), serde_json::json!(0));
    }

    #[test]
    fn from_option() {
        assert_eq!(ByteCount::from(Some(7)), ByteCount::Bytes(7));
        assert_eq!(ByteCount::from(None), ByteCount::Unavailable);
        assert!(!ByteCount::default().is_available());
    }
}
