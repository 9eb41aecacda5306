//! Native value shapes and the [`Storable`] conversion contract.
//!
//! Backends only understand [`RawValue`]: booleans, integers, reals,
//! strings, byte blobs, dates, and arrays/dictionaries of those. Any type
//! that wants to live in a [`TypedStore`](crate::TypedStore) describes how it
//! maps onto that shape by implementing [`Storable`].

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::time::SystemTime;

use crate::error::{PrefsError, Result};

/// A value in the backend's native representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    Bool(bool),
    Integer(i64),
    Real(f64),
    String(String),
    Data(Vec<u8>),
    Date(SystemTime),
    Array(Vec<RawValue>),
    Dictionary(BTreeMap<String, RawValue>),
}

impl RawValue {
    /// Short name of the shape, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            RawValue::Bool(_) => "bool",
            RawValue::Integer(_) => "integer",
            RawValue::Real(_) => "real",
            RawValue::String(_) => "string",
            RawValue::Data(_) => "data",
            RawValue::Date(_) => "date",
            RawValue::Array(_) => "array",
            RawValue::Dictionary(_) => "dictionary",
        }
    }

    /// The boolean, if this is a [`RawValue::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RawValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is a [`RawValue::Integer`].
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The string slice, if this is a [`RawValue::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check that every real number in this value, however deeply nested,
    /// is finite. JSON has no representation for NaN or infinity.
    pub fn ensure_finite(&self) -> Result<()> {
        match self {
            RawValue::Real(r) if !r.is_finite() => Err(PrefsError::Serialization(format!(
                "non-finite real {} cannot be stored",
                r
            ))),
            RawValue::Array(items) => items.iter().try_for_each(RawValue::ensure_finite),
            RawValue::Dictionary(entries) => {
                entries.values().try_for_each(RawValue::ensure_finite)
            }
            _ => Ok(()),
        }
    }
}

/// Conversion between a Rust type and its native [`RawValue`] shape.
///
/// `to_native` fails with [`PrefsError::Serialization`] when a value has
/// no native form. `from_native` returns `None` when the raw shape does not
/// describe a value of `Self`. Implementations must not coerce across shapes
/// (a string is never parsed into a number, a real is never truncated to an
/// integer).
pub trait Storable: Sized {
    /// Convert into the native representation.
    fn to_native(&self) -> Result<RawValue>;

    /// Convert from the native representation.
    fn from_native(raw: &RawValue) -> Option<Self>;
}

impl Storable for RawValue {
    fn to_native(&self) -> Result<RawValue> {
        Ok(self.clone())
    }

    fn from_native(raw: &RawValue) -> Option<Self> {
        Some(raw.clone())
    }
}

impl Storable for bool {
    fn to_native(&self) -> Result<RawValue> {
        Ok(RawValue::Bool(*self))
    }

    fn from_native(raw: &RawValue) -> Option<Self> {
        raw.as_bool()
    }
}

impl Storable for i64 {
    fn to_native(&self) -> Result<RawValue> {
        Ok(RawValue::Integer(*self))
    }

    fn from_native(raw: &RawValue) -> Option<Self> {
        raw.as_i64()
    }
}

macro_rules! storable_narrow_int {
    ($($ty:ty),*) => {
        $(
            impl Storable for $ty {
                fn to_native(&self) -> Result<RawValue> {
                    Ok(RawValue::Integer(i64::from(*self)))
                }

                fn from_native(raw: &RawValue) -> Option<Self> {
                    raw.as_i64().and_then(|i| <$ty>::try_from(i).ok())
                }
            }
        )*
    };
}

storable_narrow_int!(i32, u32, i16, u16);

impl Storable for f64 {
    fn to_native(&self) -> Result<RawValue> {
        let raw = RawValue::Real(*self);
        raw.ensure_finite()?;
        Ok(raw)
    }

    fn from_native(raw: &RawValue) -> Option<Self> {
        match raw {
            RawValue::Real(r) => Some(*r),
            // Only widen integers that f64 represents exactly.
            RawValue::Integer(i) if i.unsigned_abs() <= (1u64 << 53) => Some(*i as f64),
            _ => None,
        }
    }
}

impl Storable for String {
    fn to_native(&self) -> Result<RawValue> {
        Ok(RawValue::String(self.clone()))
    }

    fn from_native(raw: &RawValue) -> Option<Self> {
        raw.as_str().map(str::to_owned)
    }
}

impl Storable for SystemTime {
    fn to_native(&self) -> Result<RawValue> {
        Ok(RawValue::Date(*self))
    }

    fn from_native(raw: &RawValue) -> Option<Self> {
        match raw {
            RawValue::Date(t) => Some(*t),
            _ => None,
        }
    }
}

/// An opaque byte blob stored as [`RawValue::Data`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Data(pub Vec<u8>);

impl From<Vec<u8>> for Data {
    fn from(bytes: Vec<u8>) -> Self {
        Data(bytes)
    }
}

impl Storable for Data {
    fn to_native(&self) -> Result<RawValue> {
        Ok(RawValue::Data(self.0.clone()))
    }

    fn from_native(raw: &RawValue) -> Option<Self> {
        match raw {
            RawValue::Data(bytes) => Some(Data(bytes.clone())),
            _ => None,
        }
    }
}

impl<T: Storable> Storable for Vec<T> {
    fn to_native(&self) -> Result<RawValue> {
        self.iter()
            .map(Storable::to_native)
            .collect::<Result<Vec<_>>>()
            .map(RawValue::Array)
    }

    fn from_native(raw: &RawValue) -> Option<Self> {
        match raw {
            RawValue::Array(items) => items.iter().map(T::from_native).collect(),
            _ => None,
        }
    }
}

impl<T: Storable> Storable for BTreeMap<String, T> {
    fn to_native(&self) -> Result<RawValue> {
        self.iter()
            .map(|(k, v)| v.to_native().map(|v| (k.clone(), v)))
            .collect::<Result<BTreeMap<_, _>>>()
            .map(RawValue::Dictionary)
    }

    fn from_native(raw: &RawValue) -> Option<Self> {
        match raw {
            RawValue::Dictionary(entries) => entries
                .iter()
                .map(|(k, v)| T::from_native(v).map(|v| (k.clone(), v)))
                .collect(),
            _ => None,
        }
    }
}

impl<T, S> Storable for HashMap<String, T, S>
where
    T: Storable,
    S: BuildHasher + Default,
{
    fn to_native(&self) -> Result<RawValue> {
        self.iter()
            .map(|(k, v)| v.to_native().map(|v| (k.clone(), v)))
            .collect::<Result<BTreeMap<_, _>>>()
            .map(RawValue::Dictionary)
    }

    fn from_native(raw: &RawValue) -> Option<Self> {
        match raw {
            RawValue::Dictionary(entries) => entries
                .iter()
                .map(|(k, v)| T::from_native(v).map(|v| (k.clone(), v)))
                .collect(),
            _ => None,
        }
    }
}

/// A serde value stored as a JSON string.
///
/// Lets any `Serialize + DeserializeOwned` type live in a store without a
/// hand-written [`Storable`] impl. A stored string that does not parse as
/// `T` is treated like any other shape mismatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Json<T>(pub T);

impl<T> Storable for Json<T>
where
    T: Serialize + DeserializeOwned,
{
    fn to_native(&self) -> Result<RawValue> {
        Ok(RawValue::String(serde_json::to_string(&self.0)?))
    }

    fn from_native(raw: &RawValue) -> Option<Self> {
        raw.as_str()
            .and_then(|s| serde_json::from_str(s).ok())
            .map(Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_bool_rejects_other_shapes() {
        assert_eq!(bool::from_native(&RawValue::Bool(true)), Some(true));
        assert_eq!(bool::from_native(&RawValue::Integer(1)), None);
        assert_eq!(bool::from_native(&RawValue::String("true".into())), None);
    }

    #[test]
    fn test_string_is_not_parsed_as_integer() {
        assert_eq!(i64::from_native(&RawValue::String("42".into())), None);
        assert_eq!(i64::from_native(&RawValue::Integer(42)), Some(42));
    }

    #[test]
    fn test_narrow_int_range_checked() {
        assert_eq!(u32::from_native(&RawValue::Integer(7)), Some(7));
        assert_eq!(u32::from_native(&RawValue::Integer(-1)), None);
        assert_eq!(i32::from_native(&RawValue::Integer(i64::MAX)), None);
        assert_eq!(u16::from_native(&RawValue::Integer(65_536)), None);
        assert_eq!(30u32.to_native().unwrap(), RawValue::Integer(30));
    }

    #[test]
    fn test_real_widening() {
        assert_eq!(f64::from_native(&RawValue::Real(0.5)), Some(0.5));
        assert_eq!(f64::from_native(&RawValue::Integer(3)), Some(3.0));
        assert_eq!(f64::from_native(&RawValue::Integer(i64::MAX)), None);
        assert_eq!(i64::from_native(&RawValue::Real(3.0)), None);
    }

    #[test]
    fn test_date_and_data() {
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(SystemTime::from_native(&t.to_native().unwrap()), Some(t));

        let blob = Data(vec![0xde, 0xad]);
        assert_eq!(blob.to_native().unwrap(), RawValue::Data(vec![0xde, 0xad]));
        assert_eq!(Data::from_native(&RawValue::Array(vec![])), None);
    }

    #[test]
    fn test_array_requires_every_element() {
        let raw = RawValue::Array(vec![RawValue::Integer(1), RawValue::String("x".into())]);
        assert_eq!(Vec::<i64>::from_native(&raw), None);

        let raw = RawValue::Array(vec![RawValue::Integer(1), RawValue::Integer(2)]);
        assert_eq!(Vec::<i64>::from_native(&raw), Some(vec![1, 2]));
    }

    #[test]
    fn test_dictionary_shapes() {
        let mut map = BTreeMap::new();
        map.insert("width".to_string(), 800i64);
        map.insert("height".to_string(), 600i64);

        let raw = map.to_native().unwrap();
        assert_eq!(raw.kind(), "dictionary");
        assert_eq!(BTreeMap::<String, i64>::from_native(&raw), Some(map.clone()));

        let hashed: HashMap<String, i64> = HashMap::from_native(&raw).unwrap();
        assert_eq!(hashed.get("width"), Some(&800));
        assert_eq!(hashed.len(), 2);
    }

    #[test]
    fn test_raw_value_serde_shape() {
        let json = serde_json::to_string(&RawValue::Integer(5)).unwrap();
        assert_eq!(json, r#"{"Integer":5}"#);
        let back: RawValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RawValue::Integer(5));
    }

    #[test]
    fn test_non_finite_real_rejected() {
        assert!(matches!(
            f64::INFINITY.to_native(),
            Err(PrefsError::Serialization(_))
        ));
        assert!(f64::NAN.to_native().is_err());
        assert!(vec![1.0, f64::NEG_INFINITY].to_native().is_err());
        assert_eq!(2.5f64.to_native().unwrap(), RawValue::Real(2.5));
    }

    #[test]
    fn test_ensure_finite_nested() {
        let mut entries = BTreeMap::new();
        entries.insert(
            "frame".to_string(),
            RawValue::Array(vec![RawValue::Real(1.0), RawValue::Real(f64::NAN)]),
        );
        assert!(RawValue::Dictionary(entries).ensure_finite().is_err());
        assert!(RawValue::Array(vec![RawValue::Real(0.0)]).ensure_finite().is_ok());
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Window {
        title: String,
        width: u32,
    }

    #[test]
    fn test_json_round_trip() {
        let window = Json(Window {
            title: "main".to_string(),
            width: 1280,
        });

        let raw = window.to_native().unwrap();
        assert_eq!(
            raw,
            RawValue::String(r#"{"title":"main","width":1280}"#.to_string())
        );
        assert_eq!(Json::<Window>::from_native(&raw), Some(window));
    }

    #[test]
    fn test_json_mismatch() {
        assert_eq!(Json::<Window>::from_native(&RawValue::Integer(1)), None);
        assert_eq!(
            Json::<Window>::from_native(&RawValue::String("not json".into())),
            None
        );
        assert_eq!(
            Json::<Window>::from_native(&RawValue::String(r#"{"title":"x"}"#.into())),
            None
        );
    }

    #[test]
    fn test_json_unrepresentable_value() {
        let mut keyed = HashMap::new();
        keyed.insert((1, 2), "pair".to_string());
        assert!(matches!(
            Json(keyed).to_native(),
            Err(PrefsError::Serialization(_))
        ));
    }
}
