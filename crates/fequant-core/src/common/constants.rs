//! Fixed energy windows, peak tables and calibration constants for the Fe L2,3 edge.
//!
//! The calibration pairs come from regression against Fe2+/Fe3+ reference
//! standards and are versioned here rather than recomputed.

/// Closed energy window in eV.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyWindow {
    pub lo: f64,
    pub hi: f64,
}

impl EnergyWindow {
    pub const fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    pub fn contains(&self, energy: f64) -> bool {
        energy >= self.lo && energy <= self.hi
    }

    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }
}

/// Affine feature-to-valency map: `quantity = (feature + intercept) / slope`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub slope: f64,
    pub intercept: f64,
}

impl Calibration {
    pub const fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    pub fn apply(&self, feature: f64) -> f64 {
        (feature + self.intercept) / self.slope
    }
}

pub const DEFAULT_SIGNAL_RANGE: EnergyWindow = EnergyWindow::new(690.0, 703.0);
pub const DEFAULT_POLYNOMIAL_ORDER: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentTable {
    pub evaluation_window: EnergyWindow,
    pub fit_window: EnergyWindow,
    pub reference_centre: f64,
    pub iterations: usize,
    pub initial_amplitude: f64,
    pub initial_centre: f64,
    pub initial_gamma: f64,
    pub centre_bounds: (f64, f64),
    pub gamma_max: f64,
}

pub const L3_ALIGNMENT: AlignmentTable = AlignmentTable {
    evaluation_window: EnergyWindow::new(707.0, 713.5),
    fit_window: EnergyWindow::new(709.7, 710.9),
    reference_centre: 710.0,
    iterations: 5,
    initial_amplitude: 0.1,
    initial_centre: 710.2,
    initial_gamma: 0.5,
    centre_bounds: (709.5, 711.0),
    gamma_max: 0.9,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeStepTable {
    pub excluded_windows: [EnergyWindow; 2],
    pub initial_height: f64,
    pub l3_centre: f64,
    pub l2_centre: f64,
    pub anchor: f64,
}

pub const FE_EDGE_STEP: EdgeStepTable = EdgeStepTable {
    excluded_windows: [
        EnergyWindow::new(703.0, 716.5),
        EnergyWindow::new(718.0, 727.0),
    ],
    initial_height: 0.01,
    l3_centre: 708.35,
    l2_centre: 722.45,
    anchor: 685.0,
};

pub const VOIGT_PEAK_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoigtPeakTable {
    pub window: EnergyWindow,
    pub centres: [f64; VOIGT_PEAK_COUNT],
    pub fwhm_max: [f64; VOIGT_PEAK_COUNT],
    pub gamma_max: [f64; VOIGT_PEAK_COUNT],
    pub centre_tolerance: f64,
    pub initial_area: f64,
    pub initial_fwhm: f64,
    pub initial_gamma: f64,
    /// Peak carrying the Fe3+ L3 intensity.
    pub ferric_peak: usize,
    /// Peaks summed into the L3 normalisation, ferric peak included.
    pub normalisation_peaks: [usize; 5],
}

pub const FE_L3_VOIGT_PEAKS: VoigtPeakTable = VoigtPeakTable {
    window: EnergyWindow::new(705.0, 713.0),
    centres: [705.4, 706.3, 707.3, 707.9, 708.45, 710.0, 711.2, 712.4],
    fwhm_max: [0.2, 0.3, 0.3, 0.3, 0.3, 0.3, 0.3, 0.3],
    gamma_max: [0.3, 0.3, 0.35, 0.35, 0.35, 0.45, 0.35, 0.3],
    centre_tolerance: 0.25,
    initial_area: 0.05,
    initial_fwhm: 0.3,
    initial_gamma: 0.1,
    ferric_peak: 5,
    normalisation_peaks: [1, 2, 3, 4, 5],
};

pub const VOIGT_L3_CALIBRATION: Calibration =
    Calibration::new(0.00796570363521859, -0.07362046487532675);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegrationWindows {
    pub ferric: EnergyWindow,
    pub total: EnergyWindow,
}

pub const L3_INTEGRATION_WINDOWS: IntegrationWindows = IntegrationWindows {
    ferric: EnergyWindow::new(709.5, 712.0),
    total: EnergyWindow::new(706.0, 712.0),
};

pub const L2_INTEGRATION_WINDOWS: IntegrationWindows = IntegrationWindows {
    ferric: EnergyWindow::new(722.0, 727.0),
    total: EnergyWindow::new(718.0, 727.0),
};

/// The L2 ratio is only evaluated when the energy axis extends past this value.
pub const L2_COVERAGE_THRESHOLD: f64 = 727.0;

pub const INTEGRATION_L3_CALIBRATION: Calibration =
    Calibration::new(0.006058150502673548, -0.13718198657527195);

pub const INTEGRATION_L2_CALIBRATION: Calibration = Calibration::new(0.0066369293, -0.18553696661);

#[cfg(test)]
mod tests {
    use super::{
        FE_EDGE_STEP, FE_L3_VOIGT_PEAKS, INTEGRATION_L2_CALIBRATION, INTEGRATION_L3_CALIBRATION,
        L3_ALIGNMENT, L3_INTEGRATION_WINDOWS,
    };

    #[test]
    fn calibration_matches_closed_form() {
        let expected = (0.4 - 0.13718198657527195) / 0.006058150502673548;
        assert_eq!(INTEGRATION_L3_CALIBRATION.apply(0.4), expected);

        let expected_l2 = (0.3 - 0.18553696661) / 0.0066369293;
        assert_eq!(INTEGRATION_L2_CALIBRATION.apply(0.3), expected_l2);
    }

    #[test]
    fn tables_are_internally_consistent() {
        let evaluation = L3_ALIGNMENT.evaluation_window;
        assert!(evaluation.contains(L3_ALIGNMENT.fit_window.lo));
        assert!(evaluation.contains(L3_ALIGNMENT.fit_window.hi));
        assert!(FE_EDGE_STEP.anchor < FE_EDGE_STEP.l3_centre);
        let peaks = FE_L3_VOIGT_PEAKS;
        assert!(peaks.normalisation_peaks.contains(&peaks.ferric_peak));
        for centre in FE_L3_VOIGT_PEAKS.centres {
            assert!(FE_L3_VOIGT_PEAKS.window.contains(centre));
        }
        assert!(L3_INTEGRATION_WINDOWS.total.width() > L3_INTEGRATION_WINDOWS.ferric.width());
    }
}
