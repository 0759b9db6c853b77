//! Per-type policies used by every estimator and transformer
//!
//! Featurizers never special-case nullable inputs. They ask [`Nullability`]
//! whether a value is null and for the underlying value, convert numbers
//! through [`Numeric`], count categories through [`HashKey`], and persist
//! values through [`Archivable`].
//!
//! Nullable types are `Option<T>` (null is `None`) and the floating point
//! types (null is NaN). Integers, `bool` and `String` are never null.

use std::collections::HashMap;
use std::hash::Hash;

use crate::archive::Archive;
use crate::error::{Error, Result};

/// Null representation of a value type
pub trait Nullability {
    /// Type of the value once the null case is excluded
    type Value;

    /// Whether this type can represent a null at all
    const IS_NULLABLE: bool;

    /// Check if this value is the null sentinel
    fn is_null(&self) -> bool;

    /// Get the underlying value, failing on null
    fn nullable_value(&self) -> Result<&Self::Value>;
}

/// Construction of the null sentinel, only available for nullable types
pub trait NullValue: Nullability {
    /// Create the null sentinel
    fn create_null() -> Self;
}

impl<T> Nullability for Option<T> {
    type Value = T;

    const IS_NULLABLE: bool = true;

    fn is_null(&self) -> bool {
        self.is_none()
    }

    fn nullable_value(&self) -> Result<&T> {
        self.as_ref().ok_or(Error::NullValue)
    }
}

impl<T> NullValue for Option<T> {
    fn create_null() -> Self {
        None
    }
}

macro_rules! impl_float_nullability {
    ($($ty:ty),*) => {
        $(
            impl Nullability for $ty {
                type Value = $ty;

                const IS_NULLABLE: bool = true;

                fn is_null(&self) -> bool {
                    self.is_nan()
                }

                fn nullable_value(&self) -> Result<&$ty> {
                    if self.is_nan() {
                        return Err(Error::NullValue);
                    }
                    Ok(self)
                }
            }

            impl NullValue for $ty {
                fn create_null() -> Self {
                    <$ty>::NAN
                }
            }
        )*
    };
}

macro_rules! impl_non_nullable {
    ($($ty:ty),*) => {
        $(
            impl Nullability for $ty {
                type Value = $ty;

                const IS_NULLABLE: bool = false;

                fn is_null(&self) -> bool {
                    false
                }

                fn nullable_value(&self) -> Result<&$ty> {
                    Ok(self)
                }
            }
        )*
    };
}

impl_float_nullability!(f32, f64);
impl_non_nullable!(i8, i16, i32, i64, u8, u16, u32, u64, bool, String);

/// Numeric conversion into the widest native float
///
/// Transformers divide in `f64` and only then narrow to their output type.
pub trait Numeric: Copy {
    /// Widen to `f64`
    fn to_f64(self) -> f64;
}

macro_rules! impl_numeric {
    ($($ty:ty),*) => {
        $(
            impl Numeric for $ty {
                #[allow(clippy::cast_precision_loss, clippy::cast_lossless)]
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_numeric!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

/// Hashable identity of a value, used when counting categories
pub trait HashKey {
    /// Key type; floats use their bit pattern
    type Key: Hash + Eq + Clone + Send + Sync + 'static;

    /// Key for this value
    fn hash_key(&self) -> Self::Key;
}

macro_rules! impl_identity_key {
    ($($ty:ty),*) => {
        $(
            impl HashKey for $ty {
                type Key = $ty;

                fn hash_key(&self) -> $ty {
                    self.clone()
                }
            }
        )*
    };
}

impl_identity_key!(i8, i16, i32, i64, u8, u16, u32, u64, bool, String);

impl HashKey for f32 {
    type Key = u32;

    fn hash_key(&self) -> u32 {
        self.to_bits()
    }
}

impl HashKey for f64 {
    type Key = u64;

    fn hash_key(&self) -> u64 {
        self.to_bits()
    }
}

/// Canonical archive encoding of a value
pub trait Archivable: Sized {
    /// Append this value to `archive`
    fn serialize(&self, archive: &mut Archive) -> Result<()>;

    /// Consume a value from `archive`
    fn deserialize(archive: &mut Archive) -> Result<Self>;
}

macro_rules! impl_fixed_width {
    ($($ty:ty),*) => {
        $(
            impl Archivable for $ty {
                fn serialize(&self, archive: &mut Archive) -> Result<()> {
                    archive.write_bytes(&self.to_le_bytes())
                }

                fn deserialize(archive: &mut Archive) -> Result<Self> {
                    Ok(<$ty>::from_le_bytes(archive.read_array()?))
                }
            }
        )*
    };
}

impl_fixed_width!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl Archivable for bool {
    fn serialize(&self, archive: &mut Archive) -> Result<()> {
        archive.write_bytes(&[u8::from(*self)])
    }

    fn deserialize(archive: &mut Archive) -> Result<Self> {
        match archive.read_array::<1>()? {
            [0] => Ok(false),
            [1] => Ok(true),
            [other] => Err(Error::Serialization(format!("Invalid bool byte {other}"))),
        }
    }
}

/// Write a `u32` length or element-count prefix
fn write_len(archive: &mut Archive, len: usize) -> Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| Error::Serialization(format!("Length {len} does not fit in u32")))?;
    len.serialize(archive)
}

/// Read a `u32` length or element-count prefix
fn read_len(archive: &mut Archive) -> Result<usize> {
    let len = u32::deserialize(archive)?;
    usize::try_from(len).map_err(|_| Error::Serialization(format!("Length {len} too large")))
}

impl Archivable for String {
    fn serialize(&self, archive: &mut Archive) -> Result<()> {
        write_len(archive, self.len())?;
        archive.write_bytes(self.as_bytes())
    }

    fn deserialize(archive: &mut Archive) -> Result<Self> {
        let len = read_len(archive)?;
        let bytes = archive.read_bytes(len)?.to_vec();
        String::from_utf8(bytes).map_err(|e| Error::Serialization(format!("Invalid UTF-8: {e}")))
    }
}

impl<T: Archivable> Archivable for Vec<T> {
    fn serialize(&self, archive: &mut Archive) -> Result<()> {
        write_len(archive, self.len())?;
        for item in self {
            item.serialize(archive)?;
        }
        Ok(())
    }

    fn deserialize(archive: &mut Archive) -> Result<Self> {
        let len = read_len(archive)?;
        // Cap the pre-allocation so a corrupt count cannot exhaust memory
        let mut items = Vec::with_capacity(len.min(archive.remaining()));
        for _ in 0..len {
            items.push(T::deserialize(archive)?);
        }
        Ok(items)
    }
}

impl<T: Archivable> Archivable for Option<T> {
    fn serialize(&self, archive: &mut Archive) -> Result<()> {
        match self {
            Some(value) => {
                true.serialize(archive)?;
                value.serialize(archive)
            }
            None => false.serialize(archive),
        }
    }

    fn deserialize(archive: &mut Archive) -> Result<Self> {
        if bool::deserialize(archive)? {
            Ok(Some(T::deserialize(archive)?))
        } else {
            Ok(None)
        }
    }
}

/// Maps are written as a count followed by `(key, value)` pairs sorted by key
impl<K, V> Archivable for HashMap<K, V>
where
    K: Archivable + Hash + Eq + Ord,
    V: Archivable,
{
    fn serialize(&self, archive: &mut Archive) -> Result<()> {
        let mut entries: Vec<(&K, &V)> = self.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        write_len(archive, entries.len())?;
        for (key, value) in entries {
            key.serialize(archive)?;
            value.serialize(archive)?;
        }
        Ok(())
    }

    fn deserialize(archive: &mut Archive) -> Result<Self> {
        let len = read_len(archive)?;
        let mut map = HashMap::with_capacity(len.min(archive.remaining()));
        for _ in 0..len {
            let key = K::deserialize(archive)?;
            let value = V::deserialize(archive)?;
            if map.insert(key, value).is_some() {
                return Err(Error::Serialization("Duplicate key in archived map".into()));
            }
        }
        Ok(map)
    }
}
