//! The simulation form as the front-end posts it.
//!
//! Browsers send numbers as strings and vice versa, so every field is read
//! leniently and only checked when the form is normalized.

use crate::domain::contract::ContractForm;
use crate::domain::payer::only_digits;
use crate::domain::pricing::Quote;
use crate::error::{CheckoutError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;
use validator::ValidateEmail;

const LOCATION_SEPARATOR: &str = " | ";

const CONTRACT_FIELDS: [&str; 8] = [
    "nome",
    "cpf",
    "email",
    "whatsapp",
    "endereco",
    "locais",
    "plano",
    "valor_mensal_total",
];
const CHECKOUT_FIELDS: [&str; 1] = ["valor_mensal_total"];

/// Chosen locations: a preformatted string or a list of names.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Locations {
    Joined(String),
    List(Vec<String>),
}

impl Locations {
    fn normalize(&self) -> (String, usize) {
        match self {
            Self::Joined(s) => {
                let joined = s.trim().to_string();
                let count = joined
                    .split(LOCATION_SEPARATOR)
                    .filter(|l| !l.trim().is_empty())
                    .count();
                (joined, count)
            }
            Self::List(names) => {
                let names: Vec<&str> = names
                    .iter()
                    .map(|n| n.trim())
                    .filter(|n| !n.is_empty())
                    .collect();
                (names.join(LOCATION_SEPARATOR), names.len())
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationForm {
    #[serde(default, deserialize_with = "text")]
    pub nome: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub cpf: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub endereco: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub whatsapp: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub email: Option<String>,
    #[serde(default)]
    pub locais: Option<Locations>,
    #[serde(default, deserialize_with = "number")]
    pub qtd_locais: Option<Decimal>,
    #[serde(default, deserialize_with = "number")]
    pub fidelidade_anos: Option<Decimal>,
    #[serde(default, deserialize_with = "text")]
    pub plano: Option<String>,
    #[serde(default, deserialize_with = "number")]
    pub valor_base_unitario: Option<Decimal>,
    #[serde(default, deserialize_with = "number")]
    pub valor_mensal_total: Option<Decimal>,
    #[serde(default, deserialize_with = "text")]
    pub resumo: Option<String>,
}

impl SimulationForm {
    /// Validates the form and produces the record stored on submission.
    ///
    /// When the plan and fidelity resolve against the rate table, the unit
    /// price and monthly total are computed here and the submitted values are
    /// ignored.
    pub fn normalize(self) -> Result<ContractForm> {
        self.normalize_requiring(&CONTRACT_FIELDS)
    }

    /// Same shaping for a one-off checkout that is not stored as a contract.
    /// Only a monthly total is required; the payer is checked later with the
    /// rest of the gateway order.
    pub fn normalize_for_checkout(self) -> Result<ContractForm> {
        self.normalize_requiring(&CHECKOUT_FIELDS)
    }

    fn normalize_requiring(self, required: &[&str]) -> Result<ContractForm> {
        let filled = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let nome = filled(&self.nome);
        let cpf = filled(&self.cpf);
        let email = filled(&self.email);
        let whatsapp = filled(&self.whatsapp);
        let endereco = filled(&self.endereco);
        let plano = filled(&self.plano);
        let locais = self
            .locais
            .as_ref()
            .map(Locations::normalize)
            .filter(|(joined, _)| !joined.is_empty());

        let qtd_locais = match self.qtd_locais {
            Some(n) => n.trunc().to_u32().unwrap_or(0),
            None => locais.as_ref().map_or(0, |(_, count)| *count as u32),
        };
        let fidelidade_anos = self
            .fidelidade_anos
            .and_then(|n| n.trunc().to_u8())
            .unwrap_or(0);

        let quote = plano.as_deref().and_then(|plan| {
            Some(Quote {
                fidelity: fidelidade_anos.try_into().ok()?,
                plan: plan.parse().ok()?,
                locations: qtd_locais,
            })
        });

        let total = match (quote, self.valor_mensal_total) {
            (Some(quote), submitted) => {
                let computed = quote.monthly_total();
                if let Some(submitted) = submitted.filter(|s| *s != computed) {
                    tracing::warn!(%submitted, %computed, "Submitted monthly total differs from the rate table");
                }
                Some(computed)
            }
            (None, submitted) => submitted,
        };

        let missing: Vec<&str> = [
            ("nome", nome.is_none()),
            ("cpf", cpf.is_none()),
            ("email", email.is_none()),
            ("whatsapp", whatsapp.is_none()),
            ("endereco", endereco.is_none()),
            ("locais", locais.is_none()),
            ("plano", plano.is_none()),
            ("valor_mensal_total", total.is_none()),
        ]
        .into_iter()
        .filter_map(|(field, absent)| (absent && required.contains(&field)).then_some(field))
        .collect();
        if !missing.is_empty() {
            return Err(CheckoutError::validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        if let Some(email) = &email
            && !email.validate_email()
        {
            return Err(CheckoutError::validation("email is not a valid email"));
        }

        Ok(ContractForm {
            nome: nome.unwrap_or_default(),
            cpf: only_digits(&cpf.unwrap_or_default()),
            endereco: endereco.unwrap_or_default(),
            whatsapp: only_digits(&whatsapp.unwrap_or_default()),
            email: email.unwrap_or_default(),
            locais: locais.map(|(joined, _)| joined).unwrap_or_default(),
            qtd_locais,
            fidelidade_anos,
            plano: plano.unwrap_or_default(),
            valor_base_unitario: quote
                .map(|q| q.unit_price())
                .or(self.valor_base_unitario)
                .unwrap_or_default(),
            valor_mensal_total: total.unwrap_or_default(),
            resumo: self.resumo.unwrap_or_default(),
            timestamp: Utc::now(),
        })
    }
}

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(D::Error::custom(format!("expected text, found {other}"))),
    }
}

fn number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Decimal>, D::Error> {
    let raw = match Value::deserialize(deserializer)? {
        Value::Null => return Ok(None),
        Value::Number(n) => n.to_string(),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s.trim().to_string(),
        other => return Err(D::Error::custom(format!("expected a number, found {other}"))),
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map(Some)
        .map_err(|_| D::Error::custom(format!("{raw:?} is not a number")))
}
