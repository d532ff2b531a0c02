//! Shaping of form data into the gateway's payer identification.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentificationType {
    #[serde(rename = "CPF")]
    Cpf,
    #[serde(rename = "CNPJ")]
    Cnpj,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Individual,
    Association,
}

impl IdentificationType {
    /// Eleven digits is an individual's CPF; anything else is treated as a
    /// company CNPJ and left for the gateway to reject if malformed.
    pub fn classify(tax_id: &str) -> Self {
        if only_digits(tax_id).len() == 11 {
            Self::Cpf
        } else {
            Self::Cnpj
        }
    }

    pub fn entity_type(self) -> EntityType {
        match self {
            Self::Cpf => EntityType::Individual,
            Self::Cnpj => EntityType::Association,
        }
    }
}

pub fn only_digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

/// Splits a full name into `(first_name, last_name)`.
///
/// A single-word name is repeated as the last name, since the gateway
/// requires both.
pub fn split_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let rest = parts.collect::<Vec<_>>().join(" ");
    let last = if rest.is_empty() { first.clone() } else { rest };
    (first, last)
}

/// Splits a Brazilian phone number into `(area_code, number)`.
pub fn split_phone(phone: &str) -> (String, String) {
    let digits = only_digits(phone);
    let split = digits.len().min(2);
    let (area, number) = digits.split_at(split);
    (area.to_string(), number.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name() {
        assert_eq!(
            split_name("Ana Maria  da Silva"),
            ("Ana".to_string(), "Maria da Silva".to_string())
        );
        assert_eq!(split_name("  Ana "), ("Ana".to_string(), "Ana".to_string()));
        assert_eq!(split_name(""), (String::new(), String::new()));
    }

    #[test]
    fn test_classify_tax_id() {
        assert_eq!(IdentificationType::classify("12345678901"), IdentificationType::Cpf);
        assert_eq!(IdentificationType::classify("123.456.789-01"), IdentificationType::Cpf);
        assert_eq!(
            IdentificationType::classify("12345678000199"),
            IdentificationType::Cnpj
        );
        assert_eq!(IdentificationType::classify(""), IdentificationType::Cnpj);
    }

    #[test]
    fn test_identification_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&IdentificationType::Cpf).unwrap(),
            "\"CPF\""
        );
        assert_eq!(
            serde_json::to_string(&IdentificationType::Cnpj.entity_type()).unwrap(),
            "\"association\""
        );
    }

    #[test]
    fn test_split_phone() {
        assert_eq!(
            split_phone("(11) 99999-9999"),
            ("11".to_string(), "999999999".to_string())
        );
        assert_eq!(split_phone("1"), ("1".to_string(), String::new()));
    }
}
