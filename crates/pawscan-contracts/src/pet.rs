use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub const DNI_DIGITS: usize = 8;

/// Owner national identity number: exactly eight ASCII digits.
///
/// The record store keeps DNIs as JSON numbers, so leading zeros are lost on
/// the wire; deserialization pads them back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dni(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("DNI must be exactly 8 digits, got '{0}'")]
pub struct InvalidDni(pub String);

impl Dni {
    pub fn parse(raw: &str) -> Result<Self, InvalidDni> {
        let trimmed = raw.trim();
        if trimmed.len() == DNI_DIGITS && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(InvalidDni(raw.to_string()))
        }
    }

    pub fn from_number(value: u64) -> Result<Self, InvalidDni> {
        Self::parse(&format!("{value:0width$}", width = DNI_DIGITS))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_number(&self) -> u64 {
        // Eight ASCII digits always fit.
        self.0.parse().unwrap_or_default()
    }
}

impl fmt::Display for Dni {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Dni {
    type Err = InvalidDni;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Dni {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.as_number())
    }
}

impl<'de> Deserialize<'de> for Dni {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(value) => Dni::from_number(value),
            Raw::Text(value) => Dni::parse(&value),
        }
        .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Numeric code used by the record store.
    pub fn code(self) -> u8 {
        match self {
            Gender::Male => 0,
            Gender::Female => 1,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Gender::Male),
            1 => Some(Gender::Female),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" | "macho" => Ok(Gender::Male),
            "female" | "f" | "hembra" => Ok(Gender::Female),
            other => Err(format!("unknown gender '{other}' (expected male or female)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    #[default]
    Spanish,
    English,
    Quechua,
}

impl Language {
    pub fn label(self) -> &'static str {
        match self {
            Language::Spanish => "Spanish",
            Language::English => "English",
            Language::Quechua => "Quechua",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "es" | "spanish" | "español" | "espanol" => Ok(Language::Spanish),
            "en" | "english" => Ok(Language::English),
            "qu" | "quechua" => Ok(Language::Quechua),
            other => Err(format!("unsupported language '{other}'")),
        }
    }
}

/// Pet details as typed by the user. Every field is raw form input.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PetProfile {
    pub owner_dni: String,
    pub animal_name: String,
    pub gender: Option<Gender>,
    pub weight: String,
    pub age: String,
    pub language: Language,
}

/// A profile whose fields passed form validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPet {
    pub owner_dni: Dni,
    pub animal_name: String,
    pub gender: Gender,
    pub weight: f64,
    pub age: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    Description,
    Images,
    AnimalName,
    Gender,
    Weight,
    Age,
    OwnerDni,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum FormIssue {
    #[error("symptom description is required")]
    MissingDescription,
    #[error("add at least one image")]
    MissingImages,
    #[error("pet name is required")]
    MissingAnimalName,
    #[error("pet gender is required")]
    MissingGender,
    #[error("pet weight is required")]
    MissingWeight,
    #[error("pet weight must be a valid number greater than 0")]
    InvalidWeight,
    #[error("pet age is required")]
    MissingAge,
    #[error("pet age must be a valid number greater than 0")]
    InvalidAge,
    #[error("owner DNI is required")]
    MissingOwnerDni,
    #[error("owner DNI must have exactly 8 digits")]
    InvalidOwnerDni,
}

impl FormIssue {
    pub fn field(self) -> FormField {
        match self {
            FormIssue::MissingDescription => FormField::Description,
            FormIssue::MissingImages => FormField::Images,
            FormIssue::MissingAnimalName => FormField::AnimalName,
            FormIssue::MissingGender => FormField::Gender,
            FormIssue::MissingWeight | FormIssue::InvalidWeight => FormField::Weight,
            FormIssue::MissingAge | FormIssue::InvalidAge => FormField::Age,
            FormIssue::MissingOwnerDni | FormIssue::InvalidOwnerDni => FormField::OwnerDni,
        }
    }
}

/// Checks a submission in form order and reports every violation, not just
/// the first one.
pub fn validate_submission(
    description: &str,
    image_count: usize,
    pet: &PetProfile,
) -> Result<ValidatedPet, Vec<FormIssue>> {
    let mut issues = Vec::new();

    if description.trim().is_empty() {
        issues.push(FormIssue::MissingDescription);
    }
    if image_count == 0 {
        issues.push(FormIssue::MissingImages);
    }
    let animal_name = pet.animal_name.trim();
    if animal_name.is_empty() {
        issues.push(FormIssue::MissingAnimalName);
    }
    if pet.gender.is_none() {
        issues.push(FormIssue::MissingGender);
    }
    let weight = positive_number(&pet.weight, FormIssue::MissingWeight, FormIssue::InvalidWeight)
        .map_err(|issue| issues.push(issue))
        .ok();
    let age = positive_number(&pet.age, FormIssue::MissingAge, FormIssue::InvalidAge)
        .map_err(|issue| issues.push(issue))
        .ok();
    let owner_dni = if pet.owner_dni.trim().is_empty() {
        issues.push(FormIssue::MissingOwnerDni);
        None
    } else {
        Dni::parse(&pet.owner_dni)
            .map_err(|_| issues.push(FormIssue::InvalidOwnerDni))
            .ok()
    };

    match (owner_dni, pet.gender, weight, age) {
        (Some(owner_dni), Some(gender), Some(weight), Some(age)) if issues.is_empty() => {
            Ok(ValidatedPet {
                owner_dni,
                animal_name: animal_name.to_string(),
                gender,
                weight,
                age,
            })
        }
        _ => Err(issues),
    }
}

fn positive_number(raw: &str, missing: FormIssue, invalid: FormIssue) -> Result<f64, FormIssue> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(missing);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
        _ => Err(invalid),
    }
}
