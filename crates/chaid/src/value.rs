use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// An original (pre-encoding) observation of a variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RawValue {
    Missing,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl RawValue {
    pub fn is_missing(&self) -> bool {
        match self {
            RawValue::Missing => true,
            RawValue::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Int(v) => Some(*v as f64),
            RawValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            RawValue::Missing => 0,
            RawValue::Bool(_) => 1,
            RawValue::Int(_) | RawValue::Float(_) => 2,
            RawValue::Str(_) => 3,
        }
    }
}

impl Ord for RawValue {
    /// A NaN float compares as `Missing`.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_missing(), other.is_missing()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }
        match (self, other) {
            (RawValue::Bool(a), RawValue::Bool(b)) => a.cmp(b),
            (RawValue::Int(a), RawValue::Int(b)) => a.cmp(b),
            (RawValue::Str(a), RawValue::Str(b)) => a.cmp(b),
            (RawValue::Int(_) | RawValue::Float(_), RawValue::Int(_) | RawValue::Float(_)) => {
                let a = self.as_f64().unwrap_or(f64::NAN);
                let b = other.as_f64().unwrap_or(f64::NAN);
                // an Int sorts before a Float holding the same number
                a.total_cmp(&b).then_with(|| {
                    matches!(self, RawValue::Float(_)).cmp(&matches!(other, RawValue::Float(_)))
                })
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for RawValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RawValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RawValue {}

impl Hash for RawValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if self.is_missing() {
            std::mem::discriminant(&RawValue::Missing).hash(state);
            return;
        }
        std::mem::discriminant(self).hash(state);
        match self {
            RawValue::Missing => {}
            RawValue::Bool(v) => v.hash(state),
            RawValue::Int(v) => v.hash(state),
            RawValue::Float(v) => v.to_bits().hash(state),
            RawValue::Str(v) => v.hash(state),
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Missing => write!(f, "<missing>"),
            RawValue::Bool(v) => write!(f, "{}", v),
            RawValue::Int(v) => write!(f, "{}", v),
            RawValue::Float(v) => write!(f, "{}", v),
            RawValue::Str(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Str(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        RawValue::Str(v)
    }
}

impl From<bool> for RawValue {
    fn from(v: bool) -> Self {
        RawValue::Bool(v)
    }
}

impl From<i32> for RawValue {
    fn from(v: i32) -> Self {
        RawValue::Int(v as i64)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Int(v)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        if v.is_nan() {
            RawValue::Missing
        } else {
            RawValue::Float(v)
        }
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => RawValue::Missing,
        }
    }
}

/// Convenience for building raw value vectors from literal slices.
pub fn raw_values<T: Clone + Into<RawValue>>(values: &[T]) -> Vec<RawValue> {
    values.iter().cloned().map(Into::into).collect()
}
