//! Vegetation indices.
//!
//! Values outside `[0, 1]` are treated as invalid and become NaN, as are
//! pixels where any input is masked.

use crate::band::Band;
use crate::error::ReflectanceResult;

fn clamp_valid(v: f32) -> f32 {
    if (0.0..=1.0).contains(&v) {
        v
    } else {
        f32::NAN
    }
}

/// Normalized Difference Vegetation Index: `(nir - red) / (nir + red)`.
pub fn ndvi(red: &Band, nir: &Band) -> ReflectanceResult<Band> {
    red.same_shape(nir)?;

    let data = red
        .data()
        .iter()
        .zip(nir.data())
        .map(|(&r, &n)| clamp_valid((n - r) / (n + r)))
        .collect();

    Band::new(red.width(), red.height(), data)
}

/// Enhanced Vegetation Index: `2.5 * (nir - red) / (nir + 6 red - 7.5 blue + 1)`.
pub fn evi(red: &Band, nir: &Band, blue: &Band) -> ReflectanceResult<Band> {
    red.same_shape(nir)?;
    red.same_shape(blue)?;

    let data = red
        .data()
        .iter()
        .zip(nir.data())
        .zip(blue.data())
        .map(|((&r, &n), &b)| clamp_valid(2.5 * (n - r) / (n + 6.0 * r - 7.5 * b + 1.0)))
        .collect();

    Band::new(red.width(), red.height(), data)
}
