//! Generators for synthetic VIIRS-like band and quality-flag arrays.
//!
//! All grids are row-major (row 0 first).

/// Creates a raw reflectance band with predictable values.
///
/// Each cell is `col * 100 + row`, which keeps values inside the valid
/// scaled-integer range of surface reflectance products for small grids.
///
/// # Example
///
/// ```
/// use test_utils::create_raw_band;
///
/// let band = create_raw_band(10, 5);
/// assert_eq!(band.len(), 50);
/// assert_eq!(band[1], 100);
/// assert_eq!(band[10], 1);
/// ```
pub fn create_raw_band(width: usize, height: usize) -> Vec<i16> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 100 + row) as i16);
        }
    }
    data
}

/// Creates a raw band filled with one value.
pub fn create_constant_raw_band(width: usize, height: usize, value: i16) -> Vec<i16> {
    vec![value; width * height]
}

/// Creates a raw band with the fill value at the given `(col, row)` positions.
pub fn create_raw_band_with_fill(
    width: usize,
    height: usize,
    value: i16,
    fill: i16,
    fill_positions: &[(usize, usize)],
) -> Vec<i16> {
    let mut data = vec![value; width * height];
    for &(col, row) in fill_positions {
        if col < width && row < height {
            data[row * width + col] = fill;
        }
    }
    data
}

/// Creates a quality-flag grid cycling through every 8-bit value.
pub fn create_qf_sweep(width: usize, height: usize) -> Vec<u8> {
    (0..width * height).map(|i| (i % 256) as u8).collect()
}

/// Creates a quality-flag grid with one value everywhere.
pub fn create_constant_qf(width: usize, height: usize, value: u8) -> Vec<u8> {
    vec![value; width * height]
}
