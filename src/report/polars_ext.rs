use polars::prelude::{
    DataFrame, DataType, Expr, JsonFormat, JsonWriter, NULL, PolarsError, SerWriter, lit, when,
};
use serde_json::Value;

use crate::error::{DataError, IoError, TrackerError, TrackerResult};

pub(crate) fn polars_to_tracker_error(stage: &str, e: PolarsError) -> TrackerError {
    TrackerError::Data(DataError::DataFrame(format!("Error while {stage}: {e}")))
}

pub trait ExprExt {
    /// Divides two expressions, yielding null instead of a non-finite value.
    ///
    /// The result is null when the denominator is zero or null, or when the
    /// numerator is null. Null is the undefined marker for derived metrics.
    fn ratio_or_null(self, denominator: Expr) -> Expr;

    /// `self / denominator * 100`, with the same undefined semantics as
    /// [`ExprExt::ratio_or_null`].
    fn percent_of(self, denominator: Expr) -> Expr;
}

impl ExprExt for Expr {
    fn ratio_or_null(self, denominator: Expr) -> Expr {
        let numerator = self.cast(DataType::Float64);
        let denominator = denominator.cast(DataType::Float64);
        when(denominator.clone().eq(lit(0.0)))
            .then(lit(NULL).cast(DataType::Float64))
            .otherwise(numerator / denominator)
    }

    fn percent_of(self, denominator: Expr) -> Expr {
        self.ratio_or_null(denominator) * lit(100.0)
    }
}

pub trait DataFrameExt {
    fn to_json_rows(&self) -> TrackerResult<Vec<serde_json::Map<String, Value>>>;

    /// Fails with [`DataError::MissingColumn`] naming the first absent column.
    fn require_columns<I, S>(&self, columns: I) -> TrackerResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>;
}

impl DataFrameExt for DataFrame {
    fn to_json_rows(&self) -> TrackerResult<Vec<serde_json::Map<String, Value>>> {
        let height = self.height();
        if height == 0 {
            return Ok(Vec::new());
        }

        let estimated_row_size = self.width() * (1 << 6);
        let mut buf = Vec::with_capacity(height * estimated_row_size);

        JsonWriter::new(&mut buf)
            .with_json_format(JsonFormat::Json)
            .finish(&mut self.clone())
            .map_err(|e| DataError::DataFrame(e.to_string()))?;

        let json_val: Value = serde_json::from_slice(&buf).map_err(IoError::Json)?;

        match json_val {
            Value::Array(rows) => Ok(rows
                .into_iter()
                .filter_map(|v| match v {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect()),
            _ => {
                Err(DataError::DataFrame("Polars JSON output was not an array".to_string()).into())
            }
        }
    }

    fn require_columns<I, S>(&self, columns: I) -> TrackerResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let present = self.get_column_names();
        for column in columns {
            let column = column.as_ref();
            if !present.iter().any(|name| name.as_str() == column) {
                return Err(DataError::MissingColumn(column.to_string()).into());
            }
        }
        Ok(())
    }
}
