//! Contrast stretching for natural-colour previews.

use crate::band::Band;
use crate::error::{ReflectanceError, ReflectanceResult};

/// Lower and upper percentiles used for the preview stretch.
pub const PREVIEW_PERCENTILES: (f64, f64) = (2.0, 98.0);

/// Gamma applied after the stretch.
pub const PREVIEW_GAMMA: f32 = 0.5;

/// Percentile `p` (0-100) of the finite values, linearly interpolated between ranks.
pub fn percentile(values: &[f32], p: f64) -> ReflectanceResult<f32> {
    if !(0.0..=100.0).contains(&p) {
        return Err(ReflectanceError::InvalidRange(format!(
            "percentile {p} outside 0..=100"
        )));
    }

    let mut finite: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Err(ReflectanceError::NoValidPixels);
    }
    finite.sort_by(f32::total_cmp);

    let rank = p / 100.0 * (finite.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = (rank - lo as f64) as f32;

    Ok(finite[lo] + (finite[hi] - finite[lo]) * frac)
}

/// Map `[low, high]` onto `[0, 1]`, clipping outside values. NaN stays NaN.
pub fn rescale_intensity(values: &[f32], low: f32, high: f32) -> ReflectanceResult<Vec<f32>> {
    if !(high > low) {
        return Err(ReflectanceError::InvalidRange(format!(
            "empty input range [{low}, {high}]"
        )));
    }

    let span = high - low;
    Ok(values
        .iter()
        .map(|&v| ((v - low) / span).clamp(0.0, 1.0))
        .collect())
}

/// `v^gamma` for values already in `[0, 1]`.
pub fn adjust_gamma(values: &[f32], gamma: f32) -> ReflectanceResult<Vec<f32>> {
    if !(gamma > 0.0) {
        return Err(ReflectanceError::InvalidRange(format!(
            "gamma must be positive, got {gamma}"
        )));
    }
    Ok(values.iter().map(|&v| v.powf(gamma)).collect())
}

/// Natural-colour preview: one shared 2-98 % stretch over all three bands, then gamma 0.5.
pub fn stretch_rgb(red: &Band, green: &Band, blue: &Band) -> ReflectanceResult<[Band; 3]> {
    red.same_shape(green)?;
    red.same_shape(blue)?;

    let stacked: Vec<f32> = red
        .data()
        .iter()
        .chain(green.data())
        .chain(blue.data())
        .copied()
        .collect();

    let (p_low, p_high) = PREVIEW_PERCENTILES;
    let low = percentile(&stacked, p_low)?;
    let high = percentile(&stacked, p_high)?;

    let stretch = |band: &Band| -> ReflectanceResult<Band> {
        let scaled = rescale_intensity(band.data(), low, high)?;
        Band::new(band.width(), band.height(), adjust_gamma(&scaled, PREVIEW_GAMMA)?)
    };

    Ok([stretch(red)?, stretch(green)?, stretch(blue)?])
}
