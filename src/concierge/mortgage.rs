//! Fixed-rate amortization and affordability tiers.
//!
//! Everything here is a pure function of [`MortgageInputs`]; callers recompute
//! on every slider change.

use serde::{Deserialize, Serialize};

use crate::concierge::listing::{Property, DEFAULT_HOME_PRICE};
use crate::error::ConciergeError;

/// Annual property tax assumed as a share of the home price.
pub const PROPERTY_TAX_RATE: f64 = 0.0108;
/// Flat monthly home insurance estimate.
pub const HOME_INSURANCE_MONTHLY: f64 = 100.0;
/// Share of gross income available for housing.
pub const DEBT_TO_INCOME: f64 = 0.28;

pub const AFFORDABLE_BELOW: f64 = 120_000.0;
pub const STRETCH_BELOW: f64 = 180_000.0;

pub const DEFAULT_DOWN_PAYMENT_PERCENT: u8 = 20;
pub const DEFAULT_INTEREST_RATE_PERCENT: f64 = 6.5;

const DOWN_PAYMENT_MAX: u8 = 50;
const DOWN_PAYMENT_STEP: u8 = 5;
const RATE_MIN: f64 = 2.0;
const RATE_MAX: f64 = 10.0;
const RATE_STEP: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum LoanTerm {
    Fifteen,
    Twenty,
    Thirty,
}

impl LoanTerm {
    pub fn years(self) -> u32 {
        match self {
            LoanTerm::Fifteen => 15,
            LoanTerm::Twenty => 20,
            LoanTerm::Thirty => 30,
        }
    }
}

impl TryFrom<u32> for LoanTerm {
    type Error = ConciergeError;

    fn try_from(years: u32) -> Result<Self, Self::Error> {
        match years {
            15 => Ok(LoanTerm::Fifteen),
            20 => Ok(LoanTerm::Twenty),
            30 => Ok(LoanTerm::Thirty),
            other => Err(ConciergeError::InvalidMortgageInput(format!(
                "loan term must be 15, 20 or 30 years, got {}",
                other
            ))),
        }
    }
}

impl From<LoanTerm> for u32 {
    fn from(term: LoanTerm) -> Self {
        term.years()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MortgageInputs {
    pub base_price: f64,
    pub hoa_monthly: f64,
    pub down_payment_percent: u8,
    pub interest_rate_percent: f64,
    pub loan_term: LoanTerm,
}

impl Default for MortgageInputs {
    fn default() -> Self {
        Self {
            base_price: DEFAULT_HOME_PRICE,
            hoa_monthly: 0.0,
            down_payment_percent: DEFAULT_DOWN_PAYMENT_PERCENT,
            interest_rate_percent: DEFAULT_INTEREST_RATE_PERCENT,
            loan_term: LoanTerm::Thirty,
        }
    }
}

impl MortgageInputs {
    /// Default sliders priced from a listing. Unparseable prices fall back to
    /// [`DEFAULT_HOME_PRICE`].
    pub fn for_property(property: &Property) -> Self {
        Self {
            base_price: property.price_value().unwrap_or(DEFAULT_HOME_PRICE),
            hoa_monthly: property.hoa_monthly(),
            ..Self::default()
        }
    }

    /// Applies slider positions, rejecting values off the slider grid.
    pub fn with_sliders(
        self,
        down_payment_percent: u8,
        interest_rate_percent: f64,
        loan_term_years: u32,
    ) -> Result<Self, ConciergeError> {
        if down_payment_percent > DOWN_PAYMENT_MAX || down_payment_percent % DOWN_PAYMENT_STEP != 0
        {
            return Err(ConciergeError::InvalidMortgageInput(format!(
                "down payment must be 0-50% in steps of 5, got {}",
                down_payment_percent
            )));
        }

        let on_step = ((interest_rate_percent / RATE_STEP).round() * RATE_STEP
            - interest_rate_percent)
            .abs()
            < 1e-9;
        if !(RATE_MIN..=RATE_MAX).contains(&interest_rate_percent) || !on_step {
            return Err(ConciergeError::InvalidMortgageInput(format!(
                "interest rate must be 2-10% in steps of 0.25, got {}",
                interest_rate_percent
            )));
        }

        Ok(Self {
            down_payment_percent,
            interest_rate_percent,
            loan_term: LoanTerm::try_from(loan_term_years)?,
            ..self
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AffordabilityTier {
    Affordable,
    #[serde(rename = "Stretch Goal")]
    StretchGoal,
    Premium,
}

impl AffordabilityTier {
    /// Lower bounds are inclusive, upper bounds exclusive.
    pub fn from_required_income(required_annual_income: f64) -> Self {
        if required_annual_income < AFFORDABLE_BELOW {
            AffordabilityTier::Affordable
        } else if required_annual_income < STRETCH_BELOW {
            AffordabilityTier::StretchGoal
        } else {
            AffordabilityTier::Premium
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AffordabilityTier::Affordable => "Affordable",
            AffordabilityTier::StretchGoal => "Stretch Goal",
            AffordabilityTier::Premium => "Premium",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MortgageBreakdown {
    pub down_payment: f64,
    pub loan_amount: f64,
    pub monthly_pi: f64,
    pub property_tax: f64,
    pub home_insurance: f64,
    pub hoa: f64,
    pub total_monthly: f64,
    pub required_annual_income: f64,
    pub tier: AffordabilityTier,
    pub total_paid: f64,
    pub total_interest: f64,
}

pub fn calculate(inputs: &MortgageInputs) -> MortgageBreakdown {
    let base_price = inputs.base_price;
    let down_payment = base_price * f64::from(inputs.down_payment_percent) / 100.0;
    let loan_amount = base_price - down_payment;
    let monthly_rate = inputs.interest_rate_percent / 100.0 / 12.0;
    let num_payments = f64::from(inputs.loan_term.years() * 12);

    let monthly_pi = if monthly_rate == 0.0 {
        loan_amount / num_payments
    } else {
        let growth = (1.0 + monthly_rate).powf(num_payments);
        loan_amount * monthly_rate * growth / (growth - 1.0)
    };

    let property_tax = base_price * PROPERTY_TAX_RATE / 12.0;
    let home_insurance = HOME_INSURANCE_MONTHLY;
    let hoa = inputs.hoa_monthly;
    let total_monthly = monthly_pi + property_tax + home_insurance + hoa;
    let required_annual_income = total_monthly / DEBT_TO_INCOME * 12.0;
    let total_paid = monthly_pi * num_payments;

    MortgageBreakdown {
        down_payment,
        loan_amount,
        monthly_pi,
        property_tax,
        home_insurance,
        hoa,
        total_monthly,
        required_annual_income,
        tier: AffordabilityTier::from_required_income(required_annual_income),
        total_paid,
        total_interest: total_paid - loan_amount,
    }
}
