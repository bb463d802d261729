//! Numbers transform - random zero-padded digit strings.

use rand::Rng;

/// Generate exactly `length` decimal digits.
///
/// The value is uniform over `[1, 10^length)` rendered with leading zeros,
/// so `"007"` is as likely as `"700"`. All-zero strings are redrawn.
pub fn generate<R: Rng>(length: usize, rng: &mut R) -> String {
    let length = length.max(1);
    loop {
        let digits: String = (0..length)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect();
        if digits.bytes().any(|b| b != b'0') {
            return digits;
        }
    }
}
