// src/dsp/filter.rs

use biquad::{Biquad, Coefficients, DirectForm1};
use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandPassParams {
    pub low_cutoff: f32,  // Hz
    pub high_cutoff: f32, // Hz
    pub sample_rate: f32, // Hz
    pub gain: f32,
}

/// Constant-peak-gain band-pass coefficients centred on the geometric mean
/// of the cutoffs. `None` when the parameters don't describe a usable band.
pub fn band_pass_coefficients(p: BandPassParams) -> Option<Coefficients<f32>> {
    let bandwidth = p.high_cutoff - p.low_cutoff;
    if !(p.low_cutoff > 0.0 && bandwidth > 0.0 && p.sample_rate > 0.0) {
        return None;
    }

    let fc = (p.low_cutoff * p.high_cutoff).sqrt();
    let q = fc / bandwidth;
    let omega0 = 2.0 * PI * fc / p.sample_rate;
    let alpha = omega0.sin() / (2.0 * q);
    if !(alpha > 0.0) {
        return None;
    }

    let a0 = 1.0 + alpha;
    let coeffs = Coefficients {
        b0: alpha * p.gain / a0,
        b1: 0.0,
        b2: -alpha * p.gain / a0,
        a1: -2.0 * omega0.cos() / a0,
        a2: (1.0 - alpha) / a0,
    };

    let finite = [coeffs.b0, coeffs.b2, coeffs.a1, coeffs.a2]
        .iter()
        .all(|c| c.is_finite());
    finite.then_some(coeffs)
}

/// Single biquad band-pass. Delay lines start at zero and are never reset;
/// parameter changes only swap coefficients.
pub struct BandPassFilter {
    params: BandPassParams,
    usable: bool,
    df1: DirectForm1<f32>,
}

impl BandPassFilter {
    pub fn new(params: BandPassParams) -> Self {
        let coeffs = band_pass_coefficients(params);
        let usable = coeffs.is_some();
        if !usable {
            log::warn!(
                "Band-pass {}-{} Hz @ {} Hz is degenerate; output suppressed until parameters change",
                params.low_cutoff,
                params.high_cutoff,
                params.sample_rate
            );
        }
        Self {
            params,
            usable,
            df1: DirectForm1::<f32>::new(coeffs.unwrap_or(silent())),
        }
    }

    pub fn params(&self) -> BandPassParams {
        self.params
    }

    pub fn is_usable(&self) -> bool {
        self.usable
    }

    /// Re-derives coefficients if anything changed. Recurrence state is kept.
    pub fn update_parameters(&mut self, params: BandPassParams) {
        if params == self.params {
            return;
        }
        self.params = params;
        match band_pass_coefficients(params) {
            Some(coeffs) => {
                self.df1.update_coefficients(coeffs);
                self.usable = true;
            }
            None => self.usable = false,
        }
    }

    /// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
    #[inline]
    pub fn process(&mut self, sample: f32) -> f32 {
        self.df1.run(sample)
    }

    pub fn process_chunk(&mut self, chunk: &[f32]) -> Vec<f32> {
        chunk.iter().map(|&s| self.process(s)).collect()
    }
}

fn silent() -> Coefficients<f32> {
    Coefficients {
        a1: 0.0,
        a2: 0.0,
        b0: 0.0,
        b1: 0.0,
        b2: 0.0,
    }
}
