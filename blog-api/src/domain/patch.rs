use serde::{Deserialize, Deserializer};

/// A single field of a partial update.
///
/// A field missing from the request body deserializes to `Absent` (thanks to
/// `#[serde(default)]` on the containing struct); anything present, including
/// `null` for a `Patch<Option<T>>`, becomes `Present`. Only `Present` values are
/// ever written back to a stored entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Absent,
    Present(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> Patch<T> {
    pub fn as_present(&self) -> Option<&T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent => None,
        }
    }

    pub fn apply_to(self, target: &mut T) {
        if let Self::Present(value) = self {
            *target = value;
        }
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Self::Present)
    }
}
