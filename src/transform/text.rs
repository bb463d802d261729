//! Text transform - lorem placeholder words or sentences.

use crate::spec::FieldSpec;
use fake::faker::lorem::en::{Sentence, Words};
use fake::Fake;
use rand::Rng;

/// One generated sentence has this many words (upper bound exclusive)
const SENTENCE_WORDS: std::ops::Range<usize> = 5..16;

/// Generate placeholder text shaped by the field's `length`
pub fn generate<R: Rng>(field: &FieldSpec, rng: &mut R) -> String {
    if field.is_sentence() {
        sentence(rng)
    } else {
        words(field.count(), rng)
    }
}

pub fn sentence<R: Rng>(rng: &mut R) -> String {
    Sentence(SENTENCE_WORDS).fake_with_rng(rng)
}

pub fn words<R: Rng>(count: usize, rng: &mut R) -> String {
    let count = count.max(1);
    let words: Vec<String> = Words(count..count + 1).fake_with_rng(rng);
    words.join(" ")
}
