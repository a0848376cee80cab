//! Quantile engine (CDF method)

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::model::value::Value;

/// An ordered sequence of quantile boundary values.
///
/// Index 0 holds the minimum and the last index the maximum; interior values
/// are computed with the CDF interpolation method. Shared by the percentile
/// family of aggregations and by the percentile-rank computation.
#[derive(Debug, Clone)]
pub struct Quantiles {
    values: Vec<Value>,
}

impl Quantiles {
    /// Compute the 101 percentile values (0 through 100 inclusive) of a
    /// sorted, non-null decimal series.
    ///
    /// For percentile `p` with `n` data points: `k = n * p / 100`,
    /// `low = max(1, ceil(k))`, `high = min(n, floor(k + 1))`. Equal bounds
    /// select the single order statistic `data[low - 1]`; unequal bounds
    /// average `data[low - 1]` and `data[high - 1]`. All arithmetic is exact
    /// decimal.
    pub fn percentiles(data: &[Decimal]) -> Result<Quantiles> {
        if data.is_empty() {
            return Err(Error::EmptyData {
                operation: "Percentiles".to_string(),
            });
        }
        let n = data.len();
        let n_dec = Decimal::from(n);
        let hundred = Decimal::from(100);
        let two = Decimal::from(2);

        let mut values = Vec::with_capacity(101);
        values.push(Value::Number(data[0]));
        for p in 1..=99u32 {
            let k = n_dec * Decimal::from(p) / hundred;
            let low = k.ceil().to_usize().unwrap_or(1).max(1);
            let high = (k + Decimal::ONE).floor().to_usize().unwrap_or(n).min(n);
            let value = if low == high {
                data[low - 1]
            } else {
                (data[low - 1] + data[high - 1]) / two
            };
            values.push(Value::Number(value));
        }
        values.push(Value::Number(data[n - 1]));
        Ok(Quantiles { values })
    }

    /// Take every `stride`-th boundary, keeping both endpoints. Quartiles are
    /// the percentiles subsampled at stride 25, quintiles at 20, deciles at
    /// 10.
    pub fn subsample(&self, stride: usize) -> Quantiles {
        let values = self
            .values
            .iter()
            .step_by(stride)
            .cloned()
            .collect();
        Quantiles { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Which bucket a value falls into: the largest index `i` such that
    /// `quantiles[i] <= value < quantiles[i + 1]`, with the maximum mapping
    /// to the last index. Values outside `[min, max]` are an error.
    pub fn locate(&self, value: &Value) -> Result<usize> {
        let min = &self.values[0];
        let max = &self.values[self.values.len() - 1];
        if value.cmp_null_max(min).is_lt() || value.cmp_null_max(max).is_gt() {
            return Err(Error::ValueOutOfRange(value.display()));
        }
        if value == max {
            return Ok(self.values.len() - 1);
        }
        let mut i = 0;
        while value.cmp_null_max(&self.values[i + 1]).is_ge() {
            i += 1;
        }
        Ok(i)
    }
}

impl std::ops::Index<usize> for Quantiles {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}
