use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

/// Rejection reasons for a measurement that cannot produce a BMI.
#[derive(Debug, Error, PartialEq)]
pub enum BmiError {
    #[error("Height must be greater than 0")]
    InvalidHeight,
    #[error("Weight must be greater than 0")]
    InvalidWeight,
}

/// calculate_bmi
///
/// BMI = kg / m², with the height given in centimetres. The result is rounded to two
/// decimal places, which is the precision stored and displayed.
pub fn calculate_bmi(weight_kg: f64, height_cm: f64) -> Result<f64, BmiError> {
    if !height_cm.is_finite() || height_cm <= 0.0 {
        return Err(BmiError::InvalidHeight);
    }
    if !weight_kg.is_finite() || weight_kg <= 0.0 {
        return Err(BmiError::InvalidWeight);
    }

    let height_m = height_cm / 100.0;
    Ok(round2(weight_kg / (height_m * height_m)))
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// BmiCategory
///
/// Standard adult weight-status bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum BmiCategory {
    Underweight,
    #[serde(rename = "Normal weight")]
    NormalWeight,
    Overweight,
    Obese,
}

impl BmiCategory {
    pub fn of(bmi: f64) -> Self {
        if bmi < 18.5 {
            BmiCategory::Underweight
        } else if bmi < 25.0 {
            BmiCategory::NormalWeight
        } else if bmi < 30.0 {
            BmiCategory::Overweight
        } else {
            BmiCategory::Obese
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BmiCategory::Underweight => "Underweight",
            BmiCategory::NormalWeight => "Normal weight",
            BmiCategory::Overweight => "Overweight",
            BmiCategory::Obese => "Obese",
        }
    }
}
