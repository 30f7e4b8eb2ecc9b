//! Dictionary metadata and packed marker codes.

/// A fixed square-marker dictionary.
#[derive(Clone, Copy, Debug)]
pub struct Dictionary {
    /// Human-readable name (for debugging/logging).
    pub name: &'static str,
    /// Number of data bits per side.
    pub marker_size: usize,
    /// Bit errors the code set can correct unambiguously.
    pub max_correction_bits: u8,
    /// One `u64` per marker id, encoding the inner `marker_size × marker_size` bits.
    ///
    /// Bits are stored in row-major order (`idx = y * marker_size + x`) with
    /// **black = 1**.
    pub codes: &'static [u64],
}

impl Dictionary {
    /// Total number of inner bits per marker.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.marker_size * self.marker_size
    }

    #[inline]
    pub fn code(&self, id: u32) -> Option<u64> {
        self.codes.get(id as usize).copied()
    }
}

/// Codes printed on the `a4-v1` reference sheet, ids 0..=3.
///
/// Any two codes differ in at least 7 bits under every relative rotation and
/// each code differs from its own rotations in at least 6 bits, so two bit
/// errors are corrected without ambiguity.
pub const SHEET_4X4_V1: Dictionary = Dictionary {
    name: "SHEET_4X4_V1",
    marker_size: 4,
    max_correction_bits: 2,
    codes: &[0x3A32, 0xEA4A, 0xB40B, 0x73C0],
};
