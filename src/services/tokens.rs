//! Random credentials and identities. Every value comes from the OS CSPRNG.

use rand::rngs::OsRng;
use rand::{Rng, RngCore, TryRngCore};

use crate::constants::profile::{SYNC_CODE_ALPHABET, SYNC_CODE_LEN};

const ADJECTIVES: [&str; 15] = [
    "Неопознанный",
    "Загадочный",
    "Мистический",
    "Древний",
    "Теневой",
    "Странный",
    "Забытый",
    "Одинокий",
    "Тихий",
    "Быстрый",
    "Мудрый",
    "Храбрый",
    "Дикий",
    "Свободный",
    "Гордый",
];

const ANIMALS: [&str; 15] = [
    "Шакал", "Волк", "Ворон", "Сокол", "Медведь", "Лис", "Ёж", "Барсук", "Рысь", "Сыч", "Филин",
    "Хорёк", "Енот", "Суслик", "Бобр",
];

fn random_hex(len: usize) -> String {
    let mut rng = OsRng.unwrap_err();
    let mut bytes = vec![0u8; len];
    rng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// 32 random bytes as 64 hex characters.
#[must_use]
pub fn new_secret_token() -> String {
    random_hex(32)
}

/// 8 random bytes as 16 hex characters.
#[must_use]
pub fn new_avatar_seed() -> String {
    random_hex(8)
}

/// Uniform over an alphabet without the look-alike characters `I O 0 1`.
#[must_use]
pub fn new_sync_code() -> String {
    let mut rng = OsRng.unwrap_err();
    (0..SYNC_CODE_LEN)
        .map(|_| char::from(SYNC_CODE_ALPHABET[rng.random_range(0..SYNC_CODE_ALPHABET.len())]))
        .collect()
}

#[must_use]
pub fn new_display_name() -> String {
    let mut rng = OsRng.unwrap_err();
    let adjective = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
    let animal = ANIMALS[rng.random_range(0..ANIMALS.len())];
    format!("{adjective} {animal}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_secret_token_shape() {
        let token = new_secret_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, new_secret_token());
    }

    #[test]
    fn test_avatar_seed_shape() {
        let seed = new_avatar_seed();
        assert_eq!(seed.len(), 16);
        assert!(seed.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_sync_code_uses_alphabet() {
        for _ in 0..100 {
            let code = new_sync_code();
            assert_eq!(code.len(), SYNC_CODE_LEN);
            assert!(code.bytes().all(|b| SYNC_CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_display_name_from_word_lists() {
        let mut seen = HashSet::new();
        for _ in 0..50 {
            let name = new_display_name();
            let (adjective, animal) = name.split_once(' ').unwrap();
            assert!(ADJECTIVES.contains(&adjective));
            assert!(ANIMALS.contains(&animal));
            assert!(name.chars().count() <= 25);
            seen.insert(name);
        }
        assert!(seen.len() > 1);
    }
}
