//! Quality filtering and vegetation indices for VIIRS surface reflectance.
//!
//! Works on in-memory arrays already read from a VNP09GA granule
//! (`HDFEOS/GRIDS/VNP_Grid_1km_2D/Data Fields/...`). Reading HDF5 is left to
//! the caller.
//!
//! The 1 km workflow:
//!
//! 1. scale M3/M4/M5/M7 with [`Band::from_raw`]
//! 2. mask with QF5 (band quality) and QF2 (land/water) via [`Scene::apply_quality`]
//! 3. compute NDVI and EVI via [`Scene::vegetation_indices`]
//!
//! The flag interpretation follows the product user guide but has not been
//! checked against a reference dataset.

pub mod band;
pub mod error;
pub mod indices;
pub mod qf;
pub mod stretch;

use band::check_len;

pub use band::{upsample_2x, Band, VNP09GA_FILL, VNP09GA_SCALE};
pub use error::{ReflectanceError, ReflectanceResult};
pub use indices::{evi, ndvi};
pub use qf::{good_values, qf2_is_land, qf5_is_good, qf6_i3_is_good, LandWater};
pub use stretch::{adjust_gamma, percentile, rescale_intensity, stretch_rgb};

/// The four 1 km bands used for colour previews and vegetation indices.
#[derive(Debug, Clone)]
pub struct Scene {
    /// M5
    pub red: Band,
    /// M4
    pub green: Band,
    /// M3
    pub blue: Band,
    /// M7
    pub nir: Band,
}

/// NDVI and EVI over the same grid.
#[derive(Debug, Clone)]
pub struct VegetationIndices {
    pub ndvi: Band,
    pub evi: Band,
}

impl Scene {
    pub fn new(red: Band, green: Band, blue: Band, nir: Band) -> ReflectanceResult<Self> {
        red.same_shape(&green)?;
        red.same_shape(&blue)?;
        red.same_shape(&nir)?;
        Ok(Self {
            red,
            green,
            blue,
            nir,
        })
    }

    fn bands_mut(&mut self) -> [&mut Band; 4] {
        [&mut self.red, &mut self.green, &mut self.blue, &mut self.nir]
    }

    /// Mask pixels with bad M3-M7 quality (QF5) or classified as water (QF2).
    ///
    /// Returns the number of masked pixels in the red band. Both flag layers
    /// are checked before any band is touched.
    pub fn apply_quality(&mut self, qf5: &[u8], qf2: &[u8]) -> ReflectanceResult<usize> {
        let pixels = self.red.data().len();
        check_len(pixels, qf5.len())?;
        check_len(pixels, qf2.len())?;

        let mut masked = 0;
        for (i, band) in self.bands_mut().into_iter().enumerate() {
            let n = band.mask_with(qf5, qf5_is_good)? + band.mask_with(qf2, qf2_is_land)?;
            if i == 0 {
                masked = n;
            }
        }
        Ok(masked)
    }

    pub fn vegetation_indices(&self) -> ReflectanceResult<VegetationIndices> {
        Ok(VegetationIndices {
            ndvi: ndvi(&self.red, &self.nir)?,
            evi: evi(&self.red, &self.nir, &self.blue)?,
        })
    }

    /// Stretched natural-colour red, green, blue bands in `[0, 1]`.
    pub fn preview(&self) -> ReflectanceResult<[Band; 3]> {
        stretch_rgb(&self.red, &self.green, &self.blue)
    }
}
