#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterError {
    #[error("parameter '{name}' has lower bound {lower} above upper bound {upper}")]
    InvertedBounds {
        name: String,
        lower: f64,
        upper: f64,
    },
    #[error("parameter '{name}' bound must not be NaN")]
    NanBound { name: String },
    #[error("parameter '{name}' value must be finite, got {value}")]
    NonFiniteValue { name: String, value: f64 },
    #[error("model has no component named '{component}'")]
    UnknownComponent { component: String },
    #[error("component '{component}' has no parameter named '{parameter}'")]
    UnknownParameter {
        component: String,
        parameter: String,
    },
    #[error("component '{component}' expects {expected} parameter values, got {actual}")]
    ValueCountMismatch {
        component: String,
        expected: usize,
        actual: usize,
    },
}

/// One numeric model parameter: value, free flag and optional bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    value: f64,
    free: bool,
    lower: Option<f64>,
    upper: Option<f64>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            free: true,
            lower: None,
            upper: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) -> Result<(), ParameterError> {
        if !value.is_finite() {
            return Err(ParameterError::NonFiniteValue {
                name: self.name.clone(),
                value,
            });
        }
        self.value = value;
        Ok(())
    }

    pub fn is_free(&self) -> bool {
        self.free
    }

    pub fn set_free(&mut self, free: bool) {
        self.free = free;
    }

    pub fn lower(&self) -> Option<f64> {
        self.lower
    }

    pub fn upper(&self) -> Option<f64> {
        self.upper
    }

    pub fn set_lower(&mut self, lower: Option<f64>) -> Result<(), ParameterError> {
        self.set_bounds(lower, self.upper)
    }

    pub fn set_upper(&mut self, upper: Option<f64>) -> Result<(), ParameterError> {
        self.set_bounds(self.lower, upper)
    }

    /// Replace both bounds; a value outside the new bounds is kept as is.
    pub fn set_bounds(
        &mut self,
        lower: Option<f64>,
        upper: Option<f64>,
    ) -> Result<(), ParameterError> {
        if lower.is_some_and(f64::is_nan) || upper.is_some_and(f64::is_nan) {
            return Err(ParameterError::NanBound {
                name: self.name.clone(),
            });
        }
        if let (Some(lower), Some(upper)) = (lower, upper)
            && lower > upper
        {
            return Err(ParameterError::InvertedBounds {
                name: self.name.clone(),
                lower,
                upper,
            });
        }
        self.lower = lower.filter(|bound| bound.is_finite());
        self.upper = upper.filter(|bound| bound.is_finite());
        Ok(())
    }

    pub(crate) fn transform(&self, bounded: bool) -> BoundTransform {
        if !bounded {
            return BoundTransform::Identity;
        }
        match (self.lower, self.upper) {
            (None, None) => BoundTransform::Identity,
            (Some(lower), None) => BoundTransform::Lower(lower),
            (None, Some(upper)) => BoundTransform::Upper(upper),
            (Some(lower), Some(upper)) => BoundTransform::Both(lower, upper),
        }
    }
}

/// Relative distance kept from a bound when a start value sits on or past it;
/// the mappings below have zero slope exactly at the bound.
const INTERIOR_MARGIN: f64 = 1.0e-3;

/// Map between a bounded parameter and an unconstrained internal coordinate.
///
/// Two-sided bounds use `lo + (sin(u) + 1) (hi - lo) / 2`; one-sided bounds
/// use `lo - 1 + sqrt(u^2 + 1)` (or its mirror for an upper bound).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum BoundTransform {
    Identity,
    Lower(f64),
    Upper(f64),
    Both(f64, f64),
}

impl BoundTransform {
    pub(crate) fn to_internal(self, value: f64) -> f64 {
        match self {
            Self::Identity => value,
            Self::Lower(lower) => {
                let margin = INTERIOR_MARGIN * lower.abs().max(1.0);
                let offset = (value - lower).max(margin);
                ((offset + 1.0).powi(2) - 1.0).sqrt()
            }
            Self::Upper(upper) => {
                let margin = INTERIOR_MARGIN * upper.abs().max(1.0);
                let offset = (upper - value).max(margin);
                ((offset + 1.0).powi(2) - 1.0).sqrt()
            }
            Self::Both(lower, upper) => {
                let width = upper - lower;
                if width <= 0.0 {
                    return 0.0;
                }
                let margin = INTERIOR_MARGIN * width;
                let clamped = value.clamp(lower + margin, upper - margin);
                (2.0 * (clamped - lower) / width - 1.0).asin()
            }
        }
    }

    pub(crate) fn to_external(self, internal: f64) -> f64 {
        match self {
            Self::Identity => internal,
            Self::Lower(lower) => lower - 1.0 + (internal * internal + 1.0).sqrt(),
            Self::Upper(upper) => upper + 1.0 - (internal * internal + 1.0).sqrt(),
            Self::Both(lower, upper) => lower + (internal.sin() + 1.0) * (upper - lower) / 2.0,
        }
    }
}
