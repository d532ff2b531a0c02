use crate::error::CheckoutError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Contract length, in years. Longer commitments get a lower unit price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FidelityTier {
    OneYear,
    TwoYears,
    ThreeYears,
}

impl FidelityTier {
    pub const ALL: [FidelityTier; 3] = [Self::OneYear, Self::TwoYears, Self::ThreeYears];

    pub fn years(self) -> u8 {
        match self {
            Self::OneYear => 1,
            Self::TwoYears => 2,
            Self::ThreeYears => 3,
        }
    }

    fn row(self) -> usize {
        self.years() as usize - 1
    }
}

impl TryFrom<u8> for FidelityTier {
    type Error = CheckoutError;

    fn try_from(years: u8) -> Result<Self, Self::Error> {
        match years {
            1 => Ok(Self::OneYear),
            2 => Ok(Self::TwoYears),
            3 => Ok(Self::ThreeYears),
            other => Err(CheckoutError::validation(format!(
                "fidelity must be 1, 2 or 3 years (got {other})"
            ))),
        }
    }
}

impl From<FidelityTier> for u8 {
    fn from(tier: FidelityTier) -> Self {
        tier.years()
    }
}

/// Advertising slot length. Longer slots cost more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlanTier {
    Bronze,
    Prata,
    Ouro,
}

impl PlanTier {
    pub const ALL: [PlanTier; 3] = [Self::Bronze, Self::Prata, Self::Ouro];

    /// Label shown on the simulation form.
    pub fn label(self) -> &'static str {
        match self {
            Self::Bronze => "Bronze 15 seg.",
            Self::Prata => "Prata 30 seg.",
            Self::Ouro => "Ouro 45 seg.",
        }
    }

    fn column(self) -> usize {
        match self {
            Self::Bronze => 0,
            Self::Prata => 1,
            Self::Ouro => 2,
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepts both bare tier names and the form labels (`"Prata 30 seg."`),
/// matching on the first word.
impl FromStr for PlanTier {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tier = s.split_whitespace().next().unwrap_or_default();
        match tier.to_lowercase().as_str() {
            "bronze" => Ok(Self::Bronze),
            "prata" => Ok(Self::Prata),
            "ouro" => Ok(Self::Ouro),
            _ => Err(CheckoutError::validation(format!("unknown plan: {s:?}"))),
        }
    }
}

/// Monthly price per location, indexed by fidelity row then plan column.
const RATE_TABLE: [[u32; 3]; 3] = [
    [80, 144, 204], // 1 year
    [70, 126, 176], // 2 years
    [50, 90, 125],  // 3 years
];

/// Monthly price for a single location.
pub fn base_unit_price(fidelity: FidelityTier, plan: PlanTier) -> Decimal {
    Decimal::from(RATE_TABLE[fidelity.row()][plan.column()])
}

/// Monthly price for `locations` locations under the same tier pair.
pub fn monthly_total(fidelity: FidelityTier, plan: PlanTier, locations: u32) -> Decimal {
    base_unit_price(fidelity, plan) * Decimal::from(locations)
}

/// A priced selection from the simulation form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub fidelity: FidelityTier,
    pub plan: PlanTier,
    pub locations: u32,
}

impl Quote {
    pub fn unit_price(&self) -> Decimal {
        base_unit_price(self.fidelity, self.plan)
    }

    pub fn monthly_total(&self) -> Decimal {
        monthly_total(self.fidelity, self.plan, self.locations)
    }
}

/// Formats an amount the way the gateway expects it: two decimal places.
pub fn format_amount(value: Decimal) -> String {
    let mut rounded = value.round_dp(2);
    rounded.rescale(2);
    rounded.to_string()
}
