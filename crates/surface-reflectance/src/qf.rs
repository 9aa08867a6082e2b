//! Quality-flag decoding for VIIRS VNP09GA surface reflectance.
//!
//! Each flag layer packs 8 bits per pixel. Bit 0 is the least significant.
//! See the VIIRS Surface Reflectance User's Guide, tables for QF2, QF5 and QF6.

/// QF5 bits 4-7: M3, M4, M5, M7 band quality. Any set bit marks a bad pixel.
pub const QF5_VISIBLE_NIR_MASK: u8 = 0b1111_0000;

/// QF2 bits 0-2: land/water class.
pub const QF2_LAND_WATER_MASK: u8 = 0b0000_0111;

/// QF6 bit 5: I3 band quality.
pub const QF6_I3_BIT: u8 = 0b0010_0000;

/// Land/water class carried in QF2 bits 0-2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandWater {
    InlandWater,
    SeaWater,
    /// Every other class (land, desert, coastal, ...), with the raw 3-bit code.
    Land(u8),
}

impl LandWater {
    pub fn from_qf2(value: u8) -> Self {
        match value & QF2_LAND_WATER_MASK {
            0b010 => LandWater::InlandWater,
            0b011 => LandWater::SeaWater,
            code => LandWater::Land(code),
        }
    }

    pub fn is_water(self) -> bool {
        matches!(self, LandWater::InlandWater | LandWater::SeaWater)
    }
}

/// M3/M4/M5/M7 all flagged good.
pub fn qf5_is_good(value: u8) -> bool {
    value & QF5_VISIBLE_NIR_MASK == 0
}

/// Neither inland nor sea water.
pub fn qf2_is_land(value: u8) -> bool {
    !LandWater::from_qf2(value).is_water()
}

/// I3 flagged good.
pub fn qf6_i3_is_good(value: u8) -> bool {
    value & QF6_I3_BIT == 0
}

/// Every 8-bit flag value accepted by `keep`, ascending.
pub fn good_values(keep: impl Fn(u8) -> bool) -> Vec<u8> {
    (0..=u8::MAX).filter(|&v| keep(v)).collect()
}
