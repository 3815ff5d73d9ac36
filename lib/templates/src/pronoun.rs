//! German pronouns for the formal (`Sie`) and informal (`du`) address.
//!
//! Templates call `pronoun("possessive", "dative", "feminine")` and get
//! `Ihrer` or `deiner` depending on how the user wants to be addressed.

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PronounKind {
    Personal,
    Possessive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    Nominative,
    Genitive,
    Dative,
    Accusative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Masculine,
    Feminine,
    Neuter,
    Plural,
}

impl FromStr for PronounKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "personal" | "pers" => Ok(Self::Personal),
            "possessive" | "poss" => Ok(Self::Possessive),
            other => Err(format!("unknown pronoun kind '{other}'")),
        }
    }
}

impl FromStr for Case {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nominative" | "nom" => Ok(Self::Nominative),
            "genitive" | "gen" => Ok(Self::Genitive),
            "dative" | "dat" => Ok(Self::Dative),
            "accusative" | "acc" => Ok(Self::Accusative),
            other => Err(format!("unknown case '{other}'")),
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "masculine" | "m" => Ok(Self::Masculine),
            "feminine" | "f" => Ok(Self::Feminine),
            "neuter" | "n" => Ok(Self::Neuter),
            "plural" | "pl" => Ok(Self::Plural),
            other => Err(format!("unknown gender '{other}'")),
        }
    }
}

/// Declines a pronoun. Possessives need a gender and return `None` without one.
#[must_use]
pub fn pronoun(formal: bool, kind: PronounKind, case: Case, gender: Option<Gender>) -> Option<String> {
    match kind {
        PronounKind::Personal => Some(personal(formal, case).to_string()),
        PronounKind::Possessive => {
            let stem = if formal { "Ihr" } else { "dein" };
            Some(format!("{stem}{}", possessive_ending(case, gender?)))
        }
    }
}

fn personal(formal: bool, case: Case) -> &'static str {
    match (formal, case) {
        (true, Case::Nominative | Case::Accusative) => "Sie",
        (true, Case::Genitive) => "Ihrer",
        (true, Case::Dative) => "Ihnen",
        (false, Case::Nominative) => "du",
        (false, Case::Genitive) => "deiner",
        (false, Case::Dative) => "dir",
        (false, Case::Accusative) => "dich",
    }
}

fn possessive_ending(case: Case, gender: Gender) -> &'static str {
    use Case::{Accusative, Dative, Genitive, Nominative};
    use Gender::{Feminine, Masculine, Neuter, Plural};
    match (gender, case) {
        (Masculine | Neuter, Nominative) | (Neuter, Accusative) => "",
        (Masculine | Neuter, Genitive) => "es",
        (Masculine | Neuter, Dative) => "em",
        (Masculine, Accusative) => "en",
        (Feminine | Plural, Nominative | Accusative) => "e",
        (Feminine | Plural, Genitive) | (Feminine, Dative) => "er",
        (Plural, Dative) => "en",
    }
}
