use crate::value::RawValue;
use polars::error::ErrString;
use polars::prelude::{DataFrame, DataType, NamedFrom, PlSmallStr, PolarsError, PolarsResult, Series};

pub trait ChaidSeriesExt {
    /// Values of the series as [`RawValue`]s; nulls and NaNs become `Missing`.
    fn raw_values(&self) -> PolarsResult<Vec<RawValue>>;
}

impl ChaidSeriesExt for Series {
    fn raw_values(&self) -> PolarsResult<Vec<RawValue>> {
        match self.dtype() {
            DataType::Boolean => Ok(self.bool()?.into_iter().map(RawValue::from).collect()),
            DataType::String => Ok(self.str()?.into_iter().map(RawValue::from).collect()),
            DataType::Float32 | DataType::Float64 => {
                let cast = self.cast(&DataType::Float64)?;
                Ok(cast.f64()?.into_iter().map(RawValue::from).collect())
            }
            DataType::Enum(_, _) | DataType::Categorical(_, _) => {
                let cast = self.cast(&DataType::String)?;
                Ok(cast.str()?.into_iter().map(RawValue::from).collect())
            }
            dt if dt.is_integer() => {
                let cast = self.cast(&DataType::Int64)?;
                Ok(cast.i64()?.into_iter().map(RawValue::from).collect())
            }
            other => Err(PolarsError::ComputeError(ErrString::from(format!(
                "column '{}' has unsupported dtype {other:?}",
                self.name()
            )))),
        }
    }
}

pub trait ChaidDataFrameExt {
    /// Row-major values of `columns`, in the layout `Tree::apply` expects.
    fn row_values(&self, columns: &[&str]) -> PolarsResult<Vec<Vec<RawValue>>>;
}

impl ChaidDataFrameExt for DataFrame {
    fn row_values(&self, columns: &[&str]) -> PolarsResult<Vec<Vec<RawValue>>> {
        let by_column = columns
            .iter()
            .map(|name| self.column(name)?.as_materialized_series().raw_values())
            .collect::<PolarsResult<Vec<_>>>()?;
        Ok((0..self.height())
            .map(|row| by_column.iter().map(|col| col[row].clone()).collect())
            .collect())
    }
}

/// Builds a series with the narrowest dtype able to hold every value:
/// Int64, Float64 or Boolean when the values are homogeneous, String otherwise.
pub fn raw_values_to_series(name: &str, values: &[RawValue]) -> Series {
    let name = PlSmallStr::from_str(name);
    let present = || values.iter().filter(|v| !v.is_missing());

    if present().all(|v| matches!(v, RawValue::Int(_))) {
        let data: Vec<Option<i64>> = values
            .iter()
            .map(|v| match v {
                RawValue::Int(i) => Some(*i),
                _ => None,
            })
            .collect();
        return Series::new(name, data);
    }
    if present().all(|v| v.as_f64().is_some()) {
        let data: Vec<Option<f64>> = values
            .iter()
            .map(|v| if v.is_missing() { None } else { v.as_f64() })
            .collect();
        return Series::new(name, data);
    }
    if present().all(|v| matches!(v, RawValue::Bool(_))) {
        let data: Vec<Option<bool>> = values
            .iter()
            .map(|v| match v {
                RawValue::Bool(b) => Some(*b),
                _ => None,
            })
            .collect();
        return Series::new(name, data);
    }
    let data: Vec<Option<String>> = values
        .iter()
        .map(|v| if v.is_missing() { None } else { Some(v.to_string()) })
        .collect();
    Series::new(name, data)
}
