use crate::common::constants::EnergyWindow;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AxisError {
    #[error("energy axis requires at least 2 points, got {actual}")]
    InsufficientPoints { actual: usize },
    #[error("energy axis entry must be finite at index {index}, got {value}")]
    NonFiniteEnergy { index: usize, value: f64 },
    #[error(
        "energy axis must be strictly increasing, index {index} has {current} after {previous}"
    )]
    NonIncreasingEnergy {
        index: usize,
        previous: f64,
        current: f64,
    },
    #[error("energy shift must be finite, got {value}")]
    NonFiniteShift { value: f64 },
}

/// Strictly increasing energy-loss axis in eV.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyAxis {
    values: Vec<f64>,
}

impl EnergyAxis {
    pub fn new(values: Vec<f64>) -> Result<Self, AxisError> {
        if values.len() < 2 {
            return Err(AxisError::InsufficientPoints {
                actual: values.len(),
            });
        }

        for (index, value) in values.iter().copied().enumerate() {
            if !value.is_finite() {
                return Err(AxisError::NonFiniteEnergy { index, value });
            }
            if index > 0 {
                let previous = values[index - 1];
                if value <= previous {
                    return Err(AxisError::NonIncreasingEnergy {
                        index,
                        previous,
                        current: value,
                    });
                }
            }
        }

        Ok(Self { values })
    }

    /// Uniform axis of `size` samples starting at `offset`.
    pub fn uniform(offset: f64, scale: f64, size: usize) -> Result<Self, AxisError> {
        let values = (0..size).map(|index| offset + scale * index as f64);
        Self::new(values.collect())
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn min(&self) -> f64 {
        self.values[0]
    }

    pub fn max(&self) -> f64 {
        self.values[self.values.len() - 1]
    }

    /// Translate every sample by `delta` eV.
    pub fn shift(&mut self, delta: f64) -> Result<(), AxisError> {
        if !delta.is_finite() {
            return Err(AxisError::NonFiniteShift { value: delta });
        }
        for value in &mut self.values {
            *value += delta;
        }
        Ok(())
    }

    /// Index range of the samples inside the closed window.
    pub fn window_range(&self, window: EnergyWindow) -> std::ops::Range<usize> {
        let start = self.values.partition_point(|value| *value < window.lo);
        let end = self.values.partition_point(|value| *value <= window.hi);
        start..end.max(start)
    }
}
