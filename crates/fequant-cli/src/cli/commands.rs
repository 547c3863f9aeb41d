use super::CliError;
use super::helpers::{QuantReport, read_mask, read_spectrum, write_json};
use fequant_core::domain::ExecutionMode;
use fequant_core::modules::BackgroundType;
use fequant_core::pipelines::{ExtractionMethod, QuantConfig, quantify};
use std::path::PathBuf;
use tracing::info;

#[derive(clap::Args)]
pub(super) struct QuantifyArgs {
    /// Spectrum document (JSON with energy, navigation and data)
    #[arg(long)]
    input: PathBuf,

    /// JSON report output path
    #[arg(long)]
    output: PathBuf,

    /// Mask document; masked pixels keep their initial fit values
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Run configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Quantification method: Voigt_fitting or Integration
    #[arg(long)]
    method: Option<ExtractionMethod>,

    /// Recentre the L3 maximum before edge-step removal
    #[arg(long)]
    auto_shift: bool,

    /// Skip background, alignment and edge-step removal
    #[arg(long)]
    no_pre_quant: bool,

    /// Pre-edge background window as LO,HI in eV
    #[arg(long, value_delimiter = ',', value_name = "LO,HI")]
    signal_range: Option<Vec<f64>>,

    /// Background model: Polynomial, PowerLaw, Exponential or Offset
    #[arg(long)]
    background: Option<BackgroundType>,

    /// Polynomial background order
    #[arg(long)]
    polynomial_order: Option<usize>,

    /// Use the closed-form background estimate without refinement
    #[arg(long)]
    fast_background: bool,

    /// Fit pixels in parallel
    #[arg(long)]
    parallel: bool,
}

impl QuantifyArgs {
    fn resolve_config(&self) -> Result<QuantConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => QuantConfig::from_path(path).map_err(CliError::Compute)?,
            None => QuantConfig::default(),
        };

        if let Some(method) = self.method {
            config.method = method;
        }
        if self.auto_shift {
            config.auto_shift = true;
        }
        if self.no_pre_quant {
            config.pre_quant = false;
        }
        if let Some(range) = &self.signal_range {
            let [lo, hi] = range.as_slice() else {
                return Err(CliError::Usage(format!(
                    "--signal-range expects exactly two values LO,HI, got {}",
                    range.len()
                )));
            };
            config.signal_range = (*lo, *hi);
        }
        if let Some(background) = self.background {
            config.background_type = background;
        }
        if let Some(order) = self.polynomial_order {
            config.polynomial_order = order;
        }
        if self.fast_background {
            config.fast_background = true;
        }
        if self.parallel {
            config.execution_mode = ExecutionMode::Parallel;
        }

        config.validate().map_err(CliError::Compute)?;
        Ok(config)
    }
}

pub(super) fn run_quantify_command(args: QuantifyArgs) -> Result<i32, CliError> {
    let config = args.resolve_config()?;
    let spectrum = read_spectrum(&args.input)?;
    let mask = args.mask.as_deref().map(read_mask).transpose()?;

    let output = quantify(&spectrum, &config, mask.as_ref()).map_err(CliError::Compute)?;
    let report = QuantReport::new(&spectrum, &config, &output);
    write_json(&args.output, &report)?;

    info!(
        method = %config.method,
        pixels = spectrum.pixel_count(),
        report = %args.output.display(),
        "quantification report written"
    );
    println!(
        "Quantified {} pixel(s) with {}; report: {}",
        spectrum.pixel_count(),
        config.method,
        args.output.display()
    );
    Ok(0)
}

#[derive(clap::Args)]
pub(super) struct CheckConfigArgs {
    /// Run configuration file
    #[arg(long)]
    config: PathBuf,
}

pub(super) fn run_check_config_command(args: CheckConfigArgs) -> Result<i32, CliError> {
    let config = QuantConfig::from_path(&args.config).map_err(CliError::Compute)?;
    let rendered = serde_json::to_string_pretty(&config)
        .map_err(|source| CliError::Internal(source.into()))?;
    println!("{}", rendered);
    Ok(0)
}
