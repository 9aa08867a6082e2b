//! Scaled reflectance bands.

use tracing::debug;

use crate::error::{ReflectanceError, ReflectanceResult};

/// Scale factor of VNP09GA `SurfReflect_*` datasets.
pub const VNP09GA_SCALE: f32 = 0.0001;

/// Fill value of VNP09GA `SurfReflect_*` datasets.
pub const VNP09GA_FILL: i16 = -28672;

pub(crate) fn check_len(expected: usize, actual: usize) -> ReflectanceResult<()> {
    if expected != actual {
        return Err(ReflectanceError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Cell count of a `width x height` grid.
fn cell_count(width: usize, height: usize) -> ReflectanceResult<usize> {
    width
        .checked_mul(height)
        .ok_or(ReflectanceError::GridTooLarge { width, height })
}

/// A row-major grid of reflectance values. Masked pixels are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Band {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> ReflectanceResult<Self> {
        check_len(cell_count(width, height)?, data.len())?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Apply the dataset scale factor. Fill pixels become 0.0 rather than a scaled sentinel.
    pub fn from_raw(
        raw: &[i16],
        width: usize,
        height: usize,
        scale: f32,
        fill: i16,
    ) -> ReflectanceResult<Self> {
        check_len(cell_count(width, height)?, raw.len())?;

        let data = raw
            .iter()
            .map(|&v| if v == fill { 0.0 } else { f32::from(v) * scale })
            .collect();

        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(self.data[row * self.width + col])
    }

    /// Pixels that are not masked.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    /// Mask every pixel whose flag value is rejected by `keep`.
    ///
    /// Returns the number of pixels newly masked.
    pub fn mask_with(&mut self, flags: &[u8], keep: impl Fn(u8) -> bool) -> ReflectanceResult<usize> {
        check_len(self.data.len(), flags.len())?;

        let mut masked = 0;
        for (value, &flag) in self.data.iter_mut().zip(flags) {
            if !keep(flag) && !value.is_nan() {
                *value = f32::NAN;
                masked += 1;
            }
        }

        debug!(masked, total = self.data.len(), "Applied quality mask");
        Ok(masked)
    }

    pub(crate) fn same_shape(&self, other: &Band) -> ReflectanceResult<()> {
        let expected = (self.width, self.height);
        let actual = (other.width, other.height);
        if expected != actual {
            return Err(ReflectanceError::ShapeMismatch { expected, actual });
        }
        Ok(())
    }
}

/// Nearest-neighbour 2x upsampling: each cell becomes a 2x2 block.
///
/// Brings 1 km flag layers onto the 500 m band grid.
pub fn upsample_2x<T: Copy>(grid: &[T], width: usize, height: usize) -> ReflectanceResult<Vec<T>> {
    check_len(cell_count(width, height)?, grid.len())?;

    let too_large = ReflectanceError::GridTooLarge { width, height };
    let out_width = width.checked_mul(2).ok_or_else(|| too_large.clone())?;
    let out_len = grid.len().checked_mul(4).ok_or(too_large)?;
    let mut out = Vec::with_capacity(out_len);
    for row in grid.chunks(width.max(1)).take(height) {
        let mut line = Vec::with_capacity(out_width);
        for &v in row {
            line.push(v);
            line.push(v);
        }
        out.extend_from_slice(&line);
        out.extend_from_slice(&line);
    }
    Ok(out)
}
