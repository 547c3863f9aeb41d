use super::CliError;
use anyhow::Context;
use fequant_core::domain::QuantError;
use fequant_core::fitting::PixelFitStatus;
use fequant_core::modules::{AlignmentReport, SecondEdge};
use fequant_core::pipelines::{QuantConfig, QuantOutput, Quantification};
use fequant_core::spectrum::{EnergyAxis, Mask, NavMap, NavShape, Spectrum, SpectrumError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// `{ "energy": [...], "navigation": [...], "data": [...] }`, data row-major
/// with the energy axis innermost.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct SpectrumDocument {
    energy: Vec<f64>,
    #[serde(default)]
    navigation: Vec<usize>,
    data: Vec<f64>,
}

impl SpectrumDocument {
    fn into_spectrum(self) -> Result<Spectrum, QuantError> {
        let axis = EnergyAxis::new(self.energy).map_err(SpectrumError::from)?;
        let shape = NavShape::from_dims(&self.navigation)?;
        Ok(Spectrum::new(axis, shape, self.data)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct MaskDocument {
    #[serde(default)]
    navigation: Vec<usize>,
    mask: Vec<bool>,
}

impl MaskDocument {
    fn into_mask(self) -> Result<Mask, QuantError> {
        let shape = NavShape::from_dims(&self.navigation)?;
        Ok(Mask::new(shape, self.mask)?)
    }
}

fn read_json_document<T: DeserializeOwned>(path: &Path, kind: &str) -> Result<T, CliError> {
    let content = fs::read_to_string(path).map_err(|source| {
        CliError::Compute(QuantError::io_system(
            "IO.INPUT_READ",
            format!("failed to read {} '{}': {}", kind, path.display(), source),
        ))
    })?;
    serde_json::from_str(&content).map_err(|source| {
        CliError::Compute(QuantError::input_validation(
            "INPUT.DOCUMENT",
            format!("failed to parse {} '{}': {}", kind, path.display(), source),
        ))
    })
}

pub(super) fn read_spectrum(path: &Path) -> Result<Spectrum, CliError> {
    read_json_document::<SpectrumDocument>(path, "spectrum document")?
        .into_spectrum()
        .map_err(CliError::Compute)
}

pub(super) fn read_mask(path: &Path) -> Result<Mask, CliError> {
    read_json_document::<MaskDocument>(path, "mask document")?
        .into_mask()
        .map_err(CliError::Compute)
}

pub(super) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CliError> {
    let parent = path.parent().filter(|parent| !parent.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create report directory '{}'", parent.display()))?;
    }
    let rendered = serde_json::to_string_pretty(value).context("failed to serialize report")?;
    fs::write(path, rendered)
        .with_context(|| format!("failed to write report '{}'", path.display()))?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub(super) struct QuantReport {
    navigation: Vec<usize>,
    method: &'static str,
    pre_quant: bool,
    quantification: QuantificationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    edge_step: Option<EdgeStepReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alignment: Option<AlignmentReport>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum QuantificationReport {
    Voigt {
        int_fe3: Vec<f64>,
        q: Vec<f64>,
        fit_statuses: Vec<PixelFitStatus>,
    },
    Integration {
        int_fe3: Vec<f64>,
        q1: Vec<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        int_fe3_l2: Option<Vec<f64>>,
        q2: Vec<f64>,
        second_edge: SecondEdge,
    },
}

#[derive(Debug, Serialize)]
struct EdgeStepReport {
    height_1: Vec<f64>,
    height_2: Vec<f64>,
    fit_statuses: Vec<PixelFitStatus>,
}

fn values<T: Clone>(map: &NavMap<T>) -> Vec<T> {
    map.values().to_vec()
}

impl QuantReport {
    pub(super) fn new(
        spectrum: &Spectrum,
        config: &QuantConfig,
        output: &QuantOutput,
    ) -> Self {
        let quantification = match output.quantification() {
            Quantification::Voigt(voigt) => QuantificationReport::Voigt {
                int_fe3: values(&voigt.int_fe3),
                q: values(&voigt.q),
                fit_statuses: values(&voigt.fit.statuses()),
            },
            Quantification::Integration(integration) => QuantificationReport::Integration {
                int_fe3: values(&integration.int_fe3),
                q1: values(&integration.q1),
                int_fe3_l2: integration.int_fe3_l2.as_ref().map(values),
                q2: values(&integration.q2),
                second_edge: integration.second_edge,
            },
        };

        let (edge_step, alignment) = match output {
            QuantOutput::PreQuant(pre_quant) => (
                Some(EdgeStepReport {
                    height_1: values(&pre_quant.edge_step.height_1),
                    height_2: values(&pre_quant.edge_step.height_2),
                    fit_statuses: values(&pre_quant.edge_step.statuses),
                }),
                pre_quant.alignment.clone(),
            ),
            QuantOutput::Direct(_) => (None, None),
        };

        Self {
            navigation: spectrum.nav_shape().dims(),
            method: config.method.as_str(),
            pre_quant: config.pre_quant,
            quantification,
            edge_step,
            alignment,
        }
    }
}
