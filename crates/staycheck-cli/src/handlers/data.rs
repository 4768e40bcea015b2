//! Random guest data accepted by the booking and contact forms

use rand::seq::SliceRandom;
use rand::Rng;

const FIRST_NAMES: [&str; 8] = [
    "Amelia", "Oliver", "Isla", "George", "Freya", "Arthur", "Poppy", "Harry",
];
const LAST_NAMES: [&str; 8] = [
    "Hughes", "Walker", "Clarke", "Turner", "Bennett", "Foster", "Harper", "Lawson",
];
const SENTENCES: [&str; 4] = [
    "Is a double room available for the dates I searched?",
    "Could you confirm whether breakfast is included in the rate?",
    "We will arrive late in the evening and need a key code.",
    "Please let me know if parking is available on site.",
];

/// First and last name drawn from the pools
pub fn person<R: Rng + ?Sized>(rng: &mut R) -> (String, String) {
    let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Amelia");
    let last = LAST_NAMES.choose(rng).copied().unwrap_or("Hughes");
    (first.to_string(), last.to_string())
}

/// Lowercase `first.last<5 digits>@example.test`
pub fn email<R: Rng + ?Sized>(rng: &mut R, first: &str, last: &str) -> String {
    let unique: u32 = rng.gen_range(0..100_000);
    format!("{first}.{last}{unique:05}@example.test").to_lowercase()
}

/// UK mobile: `07` plus nine digits
pub fn uk_mobile<R: Rng + ?Sized>(rng: &mut R) -> String {
    let digits: u32 = rng.gen_range(0..1_000_000_000);
    format!("07{digits:09}")
}

/// `Subject` plus four digits
pub fn subject<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("Subject {:04}", rng.gen_range(0..10_000u32))
}

/// Two sentences, always at least 20 characters
pub fn message<R: Rng + ?Sized>(rng: &mut R) -> String {
    SENTENCES
        .choose_multiple(rng, 2)
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_mobile_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let phone = uk_mobile(&mut rng);
            assert_eq!(phone.len(), 11);
            assert!(phone.starts_with("07"));
            assert!(phone.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_person_and_email() {
        let mut rng = StdRng::seed_from_u64(11);
        let (first, last) = person(&mut rng);
        assert!(FIRST_NAMES.contains(&first.as_str()));
        assert!(LAST_NAMES.contains(&last.as_str()));
        let email = email(&mut rng, &first, &last);
        assert!(email.starts_with(&format!("{first}.{last}").to_lowercase()));
        assert!(email.ends_with("@example.test"));
    }

    #[test]
    fn test_message_and_subject_lengths() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            assert!(message(&mut rng).len() >= 20);
            let subject = subject(&mut rng);
            assert_eq!(subject.len(), "Subject 0000".len());
        }
    }

    #[test]
    fn test_same_seed_same_data() {
        let a = uk_mobile(&mut StdRng::seed_from_u64(42));
        let b = uk_mobile(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
