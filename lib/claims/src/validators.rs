//! Answer validators the claim questionnaires refer to by name.

use parlance_conversation::ValidatorRegistry;

/// All validators of the claim questionnaires.
#[must_use]
pub fn registry() -> ValidatorRegistry {
    let mut registry = ValidatorRegistry::new();
    registry.register_fn("imei", imei);
    registry.register_fn("non_empty", non_empty);
    registry.register_fn("phone_number", phone_number);
    registry.register_fn("yes_no", yes_no);
    registry
}

/// A 15 digit IMEI with a valid Luhn check digit. Spaces, dashes and slashes
/// between the digits are dropped.
#[must_use]
pub fn imei(answer: &str) -> Option<String> {
    let digits: String = answer
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '/'))
        .collect();
    if digits.len() != 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    luhn(&digits).then_some(digits)
}

fn luhn(digits: &str) -> bool {
    let sum: u32 = digits
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

#[must_use]
pub fn non_empty(answer: &str) -> Option<String> {
    let answer = answer.trim();
    (!answer.is_empty()).then(|| answer.to_string())
}

/// A phone number of at least six digits, optionally with a leading `+`.
#[must_use]
pub fn phone_number(answer: &str) -> Option<String> {
    let answer = answer.trim();
    let (plus, rest) = match answer.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", answer),
    };
    let digits: String = rest.chars().filter(|c| !matches!(c, ' ' | '-' | '/' | '(' | ')')).collect();
    if digits.len() < 6 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("{plus}{digits}"))
}

/// German or English yes/no, normalized to `yes` or `no`.
#[must_use]
pub fn yes_no(answer: &str) -> Option<String> {
    match answer.trim().to_lowercase().as_str() {
        "ja" | "j" | "yes" | "y" | "jo" | "jap" | "klar" => Some("yes".to_string()),
        "nein" | "n" | "no" | "nö" | "ne" => Some("no".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imei_requires_a_valid_check_digit() {
        assert_eq!(imei("35-693803-564380-9"), Some("356938035643809".to_string()));
        assert_eq!(imei("356938035643808"), None);
        assert_eq!(imei("12345"), None);
        assert_eq!(imei("35693803564380x"), None);
    }

    #[test]
    fn phone_numbers_keep_the_country_prefix() {
        assert_eq!(phone_number("+49 171 1234567"), Some("+491711234567".to_string()));
        assert_eq!(phone_number("(030) 123456"), Some("030123456".to_string()));
        assert_eq!(phone_number("12 34"), None);
    }

    #[test]
    fn yes_no_normalizes_both_languages() {
        assert_eq!(yes_no(" Ja "), Some("yes".to_string()));
        assert_eq!(yes_no("nein"), Some("no".to_string()));
        assert_eq!(yes_no("vielleicht"), None);
    }

    #[test]
    fn registry_knows_every_validator() {
        let registry = registry();
        for name in ["imei", "non_empty", "phone_number", "yes_no"] {
            assert!(registry.get(name).is_some(), "{name} is registered");
        }
        assert!(non_empty("   ").is_none());
    }
}
