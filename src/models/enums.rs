//! Shared domain enums

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

// ---------------------------------------------------------------------------
// PaymentMethod
// ---------------------------------------------------------------------------

/// Accepted ways of settling a fine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Upi,
}

impl std::str::FromStr for PaymentMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "upi" => Ok(PaymentMethod::Upi),
            _ => Err(AppError::validation(
                "payment_method",
                "Payment method must be one of: cash, card, upi",
            )),
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Upi => "upi",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// ReturnCondition
// ---------------------------------------------------------------------------

/// Physical condition of a book when it comes back to the desk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReturnCondition {
    Good,
    Fair,
    Damaged,
    Lost,
}

impl ReturnCondition {
    /// Damaged and lost books trigger a replacement/damage fee downstream
    pub fn requires_fee(&self) -> bool {
        matches!(self, ReturnCondition::Damaged | ReturnCondition::Lost)
    }
}

impl std::str::FromStr for ReturnCondition {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "good" => Ok(ReturnCondition::Good),
            "fair" => Ok(ReturnCondition::Fair),
            "damaged" => Ok(ReturnCondition::Damaged),
            "lost" => Ok(ReturnCondition::Lost),
            _ => Err(AppError::validation(
                "condition",
                "Condition must be one of: good, fair, damaged, lost",
            )),
        }
    }
}

impl std::fmt::Display for ReturnCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ReturnCondition::Good => "good",
            ReturnCondition::Fair => "fair",
            ReturnCondition::Damaged => "damaged",
            ReturnCondition::Lost => "lost",
        };
        write!(f, "{}", label)
    }
}
