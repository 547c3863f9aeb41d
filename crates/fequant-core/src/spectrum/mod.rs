//! Spectral container: an energy axis plus up to two navigation dimensions.
//!
//! Data are stored row-major as `pixels × channels`, so every pixel's
//! spectrum is a contiguous slice sharing the one energy axis.

mod axis;

pub use axis::{AxisError, EnergyAxis};

use crate::common::constants::EnergyWindow;
use crate::domain::QuantError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpectrumError {
    #[error(transparent)]
    Axis(#[from] AxisError),
    #[error("spectrum data length mismatch: expected {expected} values, got {actual}")]
    DataLengthMismatch { expected: usize, actual: usize },
    #[error("navigation dimensionality must be 0, 1 or 2, got {dims:?}")]
    UnsupportedNavigation { dims: Vec<usize> },
    #[error("navigation dimensions must be non-zero, got {dims:?}")]
    ZeroSizedNavigation { dims: Vec<usize> },
    #[error("energy window [{lo}, {hi}] holds fewer than 2 samples of axis [{min}, {max}]")]
    EmptyWindow {
        lo: f64,
        hi: f64,
        min: f64,
        max: f64,
    },
    #[error(
        "mask navigation shape {actual:?} does not match spectrum navigation shape {expected:?}"
    )]
    MaskShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("stacked spectrum {index} does not share the energy axis of the first spectrum")]
    StackAxisMismatch { index: usize },
    #[error("cannot stack an empty list of spectra")]
    EmptyStack,
}

impl From<SpectrumError> for QuantError {
    fn from(error: SpectrumError) -> Self {
        let code = match &error {
            SpectrumError::Axis(_) => "INPUT.ENERGY_AXIS",
            SpectrumError::DataLengthMismatch { .. } => "INPUT.SPECTRUM_SHAPE",
            SpectrumError::UnsupportedNavigation { .. }
            | SpectrumError::ZeroSizedNavigation { .. } => "INPUT.NAVIGATION_SHAPE",
            SpectrumError::EmptyWindow { .. } => "INPUT.ENERGY_WINDOW",
            SpectrumError::MaskShapeMismatch { .. } => "INPUT.MASK_SHAPE",
            SpectrumError::StackAxisMismatch { .. } | SpectrumError::EmptyStack => {
                "INPUT.SPECTRUM_STACK"
            }
        };
        QuantError::input_validation(code, error.to_string())
    }
}

/// Navigation (scan) shape of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavShape {
    Single,
    Line(usize),
    Map { rows: usize, cols: usize },
}

impl NavShape {
    pub fn from_dims(dims: &[usize]) -> Result<Self, SpectrumError> {
        if dims.contains(&0) {
            return Err(SpectrumError::ZeroSizedNavigation {
                dims: dims.to_vec(),
            });
        }
        match dims {
            [] => Ok(Self::Single),
            [len] => Ok(Self::Line(*len)),
            [rows, cols] => Ok(Self::Map {
                rows: *rows,
                cols: *cols,
            }),
            _ => Err(SpectrumError::UnsupportedNavigation {
                dims: dims.to_vec(),
            }),
        }
    }

    pub fn dims(&self) -> Vec<usize> {
        match *self {
            Self::Single => Vec::new(),
            Self::Line(len) => vec![len],
            Self::Map { rows, cols } => vec![rows, cols],
        }
    }

    pub fn dimensionality(&self) -> usize {
        match self {
            Self::Single => 0,
            Self::Line(_) => 1,
            Self::Map { .. } => 2,
        }
    }

    pub fn pixel_count(&self) -> usize {
        match *self {
            Self::Single => 1,
            Self::Line(len) => len,
            Self::Map { rows, cols } => rows * cols,
        }
    }
}

/// Per-pixel values laid out over a navigation shape.
#[derive(Debug, Clone, PartialEq)]
pub struct NavMap<T> {
    shape: NavShape,
    values: Vec<T>,
}

impl<T> NavMap<T> {
    pub fn new(shape: NavShape, values: Vec<T>) -> Result<Self, SpectrumError> {
        if values.len() != shape.pixel_count() {
            return Err(SpectrumError::DataLengthMismatch {
                expected: shape.pixel_count(),
                actual: values.len(),
            });
        }
        Ok(Self { shape, values })
    }

    pub fn from_fn(shape: NavShape, f: impl FnMut(usize) -> T) -> Self {
        Self {
            shape,
            values: (0..shape.pixel_count()).map(f).collect(),
        }
    }

    pub fn shape(&self) -> NavShape {
        self.shape
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn get(&self, pixel: usize) -> Option<&T> {
        self.values.get(pixel)
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> NavMap<U> {
        NavMap {
            shape: self.shape,
            values: self.values.iter().map(f).collect(),
        }
    }
}

impl<T: Clone> NavMap<T> {
    pub fn filled(shape: NavShape, value: T) -> Self {
        Self {
            shape,
            values: vec![value; shape.pixel_count()],
        }
    }

    /// The single value of a navigation-less map.
    pub fn as_scalar(&self) -> Option<T> {
        match self.shape {
            NavShape::Single => self.values.first().cloned(),
            _ => None,
        }
    }
}

/// Boolean pixel mask; `true` excludes the pixel from fitting.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    flags: NavMap<bool>,
}

impl Mask {
    pub fn new(shape: NavShape, flags: Vec<bool>) -> Result<Self, SpectrumError> {
        Ok(Self {
            flags: NavMap::new(shape, flags)?,
        })
    }

    pub fn shape(&self) -> NavShape {
        self.flags.shape()
    }

    pub fn is_masked(&self, pixel: usize) -> bool {
        self.flags.get(pixel).copied().unwrap_or(false)
    }

    pub fn ensure_matches(&self, spectrum: &Spectrum) -> Result<(), SpectrumError> {
        if self.shape() != spectrum.nav_shape() {
            return Err(SpectrumError::MaskShapeMismatch {
                expected: spectrum.nav_shape().dims(),
                actual: self.shape().dims(),
            });
        }
        Ok(())
    }
}

pub(crate) fn is_masked(mask: Option<&Mask>, pixel: usize) -> bool {
    mask.is_some_and(|mask| mask.is_masked(pixel))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    axis: EnergyAxis,
    nav_shape: NavShape,
    data: Vec<f64>,
}

impl Spectrum {
    pub fn new(
        axis: EnergyAxis,
        nav_shape: NavShape,
        data: Vec<f64>,
    ) -> Result<Self, SpectrumError> {
        let expected = axis.len() * nav_shape.pixel_count();
        if data.len() != expected {
            return Err(SpectrumError::DataLengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            axis,
            nav_shape,
            data,
        })
    }

    pub fn single(axis: EnergyAxis, data: Vec<f64>) -> Result<Self, SpectrumError> {
        Self::new(axis, NavShape::Single, data)
    }

    /// Stack spectra sharing one energy axis into a line scan.
    pub fn stack(spectra: &[Spectrum]) -> Result<Self, SpectrumError> {
        let first = spectra.first().ok_or(SpectrumError::EmptyStack)?;
        let mut data = Vec::with_capacity(first.data.len() * spectra.len());
        let mut pixels = 0;
        for (index, spectrum) in spectra.iter().enumerate() {
            if spectrum.axis != first.axis {
                return Err(SpectrumError::StackAxisMismatch { index });
            }
            data.extend_from_slice(&spectrum.data);
            pixels += spectrum.pixel_count();
        }
        Self::new(first.axis.clone(), NavShape::Line(pixels), data)
    }

    pub fn axis(&self) -> &EnergyAxis {
        &self.axis
    }

    pub fn energies(&self) -> &[f64] {
        self.axis.values()
    }

    pub fn nav_shape(&self) -> NavShape {
        self.nav_shape
    }

    pub fn channel_count(&self) -> usize {
        self.axis.len()
    }

    pub fn pixel_count(&self) -> usize {
        self.nav_shape.pixel_count()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn pixel(&self, pixel: usize) -> &[f64] {
        let channels = self.channel_count();
        &self.data[pixel * channels..(pixel + 1) * channels]
    }

    pub fn pixels(&self) -> std::slice::ChunksExact<'_, f64> {
        self.data.chunks_exact(self.channel_count())
    }

    /// Translate the energy axis of every pixel by the same `delta`.
    pub fn shift_energy(&mut self, delta: f64) -> Result<(), SpectrumError> {
        self.axis.shift(delta)?;
        Ok(())
    }

    /// Restrict every pixel to the samples inside the closed window.
    pub fn crop(&self, window: EnergyWindow) -> Result<Self, SpectrumError> {
        let range = self.axis.window_range(window);
        if range.len() < 2 {
            return Err(SpectrumError::EmptyWindow {
                lo: window.lo,
                hi: window.hi,
                min: self.axis.min(),
                max: self.axis.max(),
            });
        }

        let axis = EnergyAxis::new(self.axis.values()[range.clone()].to_vec())?;
        let mut data = Vec::with_capacity(range.len() * self.pixel_count());
        for pixel in self.pixels() {
            data.extend_from_slice(&pixel[range.clone()]);
        }
        Self::new(axis, self.nav_shape, data)
    }
}
