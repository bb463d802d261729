//! Name transform - random synthetic person names.

use crate::spec::NameType;
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::Fake;
use rand::Rng;

pub fn generate<R: Rng>(name_type: NameType, rng: &mut R) -> String {
    match name_type {
        NameType::First => first(rng),
        NameType::Last => LastName().fake_with_rng(rng),
        NameType::Full => Name().fake_with_rng(rng),
    }
}

pub fn first<R: Rng>(rng: &mut R) -> String {
    FirstName().fake_with_rng(rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_full_name_has_space() {
        let mut rng = StdRng::seed_from_u64(42);
        let value = generate(NameType::Full, &mut rng);
        assert!(value.contains(' '));
    }

    #[test]
    fn test_first_and_last() {
        let mut rng = StdRng::seed_from_u64(42);
        assert!(!generate(NameType::First, &mut rng).is_empty());
        assert!(!generate(NameType::Last, &mut rng).is_empty());
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let a = generate(NameType::Full, &mut StdRng::seed_from_u64(9));
        let b = generate(NameType::Full, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }
}
