//! UUID transform - fresh random version 4 identifiers.

use rand::Rng;

pub fn generate<R: Rng>(rng: &mut R) -> String {
    format!(
        "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
        rng.random::<u32>(),
        rng.random::<u16>(),
        (rng.random::<u16>() & 0x0FFF) | 0x4000, // Version 4
        (rng.random::<u16>() & 0x3FFF) | 0x8000, // Variant
        rng.random::<u64>() & 0xFFFF_FFFF_FFFF_u64
    )
}
