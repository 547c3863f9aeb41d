use num_complex::Complex64;
use std::f64::consts::PI;

const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949_3;
const MIN_SIGMA: f64 = 1.0e-9;

const REGION_3_NUMERATOR: [f64; 5] = [16.4955, 20.209_33, 11.964_82, 3.778_987, 0.564_223_6];
const REGION_3_DENOMINATOR: [f64; 6] = [16.4955, 38.823_63, 39.271_21, 21.692_74, 6.699_398, 1.0];
const REGION_4_NUMERATOR: [f64; 7] = [
    36_183.31, 3_321.9905, 1_540.787, 219.0313, 35.766_83, 1.320_522, 0.56419,
];
const REGION_4_DENOMINATOR: [f64; 8] = [
    32_066.6, 24_322.84, 9_022.228, 2_186.181, 364.2191, 61.570_37, 1.841_439, 1.0,
];

/// `c[0] + z (c[1] + z (c[2] + ...))`.
fn horner(coefficients: &[f64], z: Complex64) -> Complex64 {
    coefficients
        .iter()
        .rev()
        .fold(Complex64::new(0.0, 0.0), |acc, c| acc * z + *c)
}

/// Faddeeva function `w(z) = exp(-z^2) erfc(-iz)` for `Im(z) >= 0`.
///
/// Humlicek (1982) four-region rational approximation, relative accuracy
/// around 1e-4 across the upper half plane.
pub fn faddeeva(z: Complex64) -> Complex64 {
    let x = z.re;
    let y = z.im;
    let t = Complex64::new(y, -x);
    let s = x.abs() + y;

    if s >= 15.0 {
        t * 0.564_189_6 / (0.5 + t * t)
    } else if s >= 5.5 {
        let u = t * t;
        t * (1.410_474 + u * 0.564_189_6) / (0.75 + u * (3.0 + u))
    } else if y >= 0.195 * x.abs() - 0.176 {
        horner(&REGION_3_NUMERATOR, t) / horner(&REGION_3_DENOMINATOR, t)
    } else {
        let u = t * t;
        let numerator = t * horner(&REGION_4_NUMERATOR, -u);
        u.exp() - numerator / horner(&REGION_4_DENOMINATOR, -u)
    }
}

/// Area-normalised Voigt profile.
///
/// `fwhm` is the Gaussian full width at half maximum and `gamma` the
/// Lorentzian half width, so `area` is the integral over all energies.
pub fn voigt_profile(x: f64, area: f64, centre: f64, fwhm: f64, gamma: f64) -> f64 {
    let sigma = (fwhm / FWHM_PER_SIGMA).max(MIN_SIGMA);
    let scale = sigma * std::f64::consts::SQRT_2;
    let z = Complex64::new((x - centre) / scale, gamma.max(0.0) / scale);
    area * faddeeva(z).re / (sigma * (2.0 * PI).sqrt())
}

#[cfg(test)]
mod tests {
    use super::{FWHM_PER_SIGMA, faddeeva, voigt_profile};
    use num_complex::Complex64;
    use std::f64::consts::PI;

    fn gaussian(x: f64, area: f64, centre: f64, fwhm: f64) -> f64 {
        let sigma = fwhm / FWHM_PER_SIGMA;
        let arg = (x - centre) / sigma;
        area * (-0.5 * arg * arg).exp() / (sigma * (2.0 * PI).sqrt())
    }

    #[test]
    fn faddeeva_matches_reference_points() {
        // w(i y) = exp(y^2) erfc(y); w(0) = 1, w(i) = 0.42758357615580705.
        let origin = faddeeva(Complex64::new(0.0, 0.0));
        assert!((origin.re - 1.0).abs() < 1.0e-4, "w(0) = {origin}");
        let unit = faddeeva(Complex64::new(0.0, 1.0));
        assert!(
            (unit.re - 0.427_583_576_155_807).abs() < 1.0e-4,
            "w(i) = {unit}"
        );

        // Large |z| follows the asymptotic i / (sqrt(pi) z).
        let far = faddeeva(Complex64::new(30.0, 1.0));
        let asymptotic = Complex64::new(0.0, 1.0) / (PI.sqrt() * Complex64::new(30.0, 1.0));
        assert!((far - asymptotic).norm() < 1.0e-4);
    }

    #[test]
    fn voigt_reduces_to_gaussian_without_lorentzian_width() {
        let peak_height = gaussian(710.0, 2.0, 710.0, 0.3);
        for x in [709.6, 709.9, 710.0, 710.2, 710.5] {
            let voigt = voigt_profile(x, 2.0, 710.0, 0.3, 0.0);
            let expected = gaussian(x, 2.0, 710.0, 0.3);
            assert!(
                (voigt - expected).abs() <= 1.0e-3 * peak_height,
                "x={x}: voigt={voigt} gaussian={expected}"
            );
        }
    }

    #[test]
    fn voigt_profile_integrates_to_area() {
        let step = 0.001;
        let integral: f64 = (0..40_000)
            .map(|index| 690.0 + step * index as f64)
            .map(|x| voigt_profile(x, 1.5, 710.0, 0.3, 0.1) * step)
            .sum();
        // Lorentzian tails beyond +-20 eV hold ~0.1/(20 pi) of the area each side.
        assert!((integral - 1.5).abs() < 1.0e-2, "integral = {integral}");
    }
}
