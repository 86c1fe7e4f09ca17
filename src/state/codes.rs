//! Game codes and digit shuffles.
//!
//! Codes are random and unchecked: two games can, rarely, draw the same
//! code. Nothing here consults the store.

use rand::seq::SliceRandom;
use rand::Rng;

use super::settings::{DigitOrder, DIGIT_COUNT};

/// Length of a game code.
pub const GAME_CODE_LEN: usize = 8;

/// Characters a game code is drawn from.
pub const GAME_CODE_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draw a fresh game code.
pub fn generate_game_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let alphabet = GAME_CODE_ALPHABET.as_bytes();
    let mut code = String::with_capacity(GAME_CODE_LEN);
    for _ in 0..GAME_CODE_LEN {
        let idx = rng.random_range(0..alphabet.len());
        code.push(alphabet[idx] as char);
    }
    code
}

/// Normalize user input to the stored form of a code.
pub fn normalize_game_code(input: &str) -> String {
    input.trim().to_uppercase()
}

/// Check if a string has the shape of a generated code.
pub fn is_valid_game_code(value: &str) -> bool {
    value.len() == GAME_CODE_LEN && value.chars().all(|ch| GAME_CODE_ALPHABET.contains(ch))
}

/// Uniformly shuffled order of the digits 0-9 (Fisher-Yates).
pub fn shuffled_digits<R: Rng + ?Sized>(rng: &mut R) -> DigitOrder {
    let mut digits: Vec<u8> = (0..DIGIT_COUNT as u8).collect();
    digits.shuffle(rng);
    // A shuffle of 0..10 is always a permutation.
    DigitOrder::from_slice(&digits).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_game_code_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let code = generate_game_code(&mut rng);
            assert!(is_valid_game_code(&code), "bad code {code}");
            assert_eq!(normalize_game_code(&code), code);
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_game_code("  ab12cd34 "), "AB12CD34");
        assert_eq!(normalize_game_code(""), "");
        assert!(!is_valid_game_code("ab12cd34"));
        assert!(!is_valid_game_code("AB12"));
    }

    #[test]
    fn test_shuffle_reaches_every_position() {
        // Each digit should land in each position at least once over many draws.
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = [[false; DIGIT_COUNT]; DIGIT_COUNT];
        for _ in 0..2000 {
            let order = shuffled_digits(&mut rng);
            for (pos, &digit) in order.as_slice().iter().enumerate() {
                seen[digit as usize][pos] = true;
            }
        }
        assert!(seen.iter().all(|row| row.iter().all(|&hit| hit)));
    }

    #[test]
    fn test_shuffle_is_roughly_uniform() {
        let mut rng = StdRng::seed_from_u64(1234);
        let draws = 20_000;
        let mut counts = [0u32; DIGIT_COUNT];
        for _ in 0..draws {
            let order = shuffled_digits(&mut rng);
            counts[order.as_slice()[0] as usize] += 1;
        }
        // Expected 2000 per digit; allow a wide band.
        for count in counts {
            assert!((1700..2300).contains(&count), "skewed count {count}");
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn shuffled_digits_is_permutation(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let order = shuffled_digits(&mut rng);
            let mut sorted = order.as_slice().to_vec();
            sorted.sort_unstable();
            prop_assert_eq!(sorted, (0..10u8).collect::<Vec<_>>());
        }
    }
}
