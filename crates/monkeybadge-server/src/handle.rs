//! Random handles and tokens for new badges.

use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "brave", "cheeky", "clever", "cosmic", "dapper", "fuzzy", "groovy", "hairy", "jolly",
    "lucky", "mighty", "nimble", "plucky", "quirky", "rowdy", "sassy", "sneaky", "spicy",
    "swift", "wily",
];

const NOUNS: &[&str] = &[
    "ape", "baboon", "banana", "bonobo", "capuchin", "chimp", "gibbon", "gorilla", "lemur",
    "macaque", "mandrill", "marmoset", "monkey", "orangutan", "tamarin", "titi",
];

/// Token length in random bytes; tokens are hex encoded.
const TOKEN_BYTES: usize = 16;

/// An `adjective-noun` handle that always passes handle validation.
pub fn generate_handle<R: Rng>(rng: &mut R) -> String {
    let adjective = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.random_range(0..NOUNS.len())];
    format!("{adjective}-{noun}")
}

pub fn generate_token<R: Rng>(rng: &mut R) -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rng.fill(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use monkeybadge_core::badge::validate_handle;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn every_combination_is_a_valid_handle() {
        for adjective in ADJECTIVES {
            for noun in NOUNS {
                let handle = format!("{adjective}-{noun}");
                assert!(validate_handle(&handle).is_ok(), "{handle}");
            }
        }
    }

    #[test]
    fn generated_handle_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let handle = generate_handle(&mut rng);
        let (adjective, noun) = handle.split_once('-').unwrap();
        assert!(ADJECTIVES.contains(&adjective));
        assert!(NOUNS.contains(&noun));
    }

    #[test]
    fn tokens_are_hex_and_distinct() {
        let mut rng = StdRng::seed_from_u64(2);
        let a = generate_token(&mut rng);
        let b = generate_token(&mut rng);
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
