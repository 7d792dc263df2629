//! The named wine-quality request body and its encoding into model input.

use serde::Deserialize;
use crate::artifact::FeatureVector;
use crate::error::ServiceError;

/// Input order the wine-quality model is trained on.
pub const WINE_FEATURE_NAMES: [&str; 12] = [
    "wine_type",
    "fixed_acidity",
    "volatile_acidity",
    "citric_acid",
    "residual_sugar",
    "chlorides",
    "free_sulfur_dioxide",
    "total_sulfur_dioxide",
    "density",
    "pH",
    "sulphates",
    "alcohol",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WineFeatures {
    #[serde(rename = "type")]
    pub wine_type: String,
    pub fixed_acidity: f64,
    pub volatile_acidity: f64,
    pub citric_acid: f64,
    pub residual_sugar: f64,
    pub chlorides: f64,
    pub free_sulfur_dioxide: f64,
    pub total_sulfur_dioxide: f64,
    pub density: f64,
    #[serde(rename = "pH")]
    pub ph: f64,
    pub sulphates: f64,
    pub alcohol: f64,
}

impl WineFeatures {
    /// `red` is 0 and `white` is 1, case-insensitively.
    pub fn type_code(&self) -> Result<f64, ServiceError> {
        match self.wine_type.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(0.0),
            "white" => Ok(1.0),
            other => Err(ServiceError::InvalidInput(format!("type must be 'red' or 'white', got '{other}'"))),
        }
    }

    pub fn into_feature_vector(self) -> Result<FeatureVector, ServiceError> {
        let values = vec![
            self.type_code()?,
            self.fixed_acidity,
            self.volatile_acidity,
            self.citric_acid,
            self.residual_sugar,
            self.chlorides,
            self.free_sulfur_dioxide,
            self.total_sulfur_dioxide,
            self.density,
            self.ph,
            self.sulphates,
            self.alcohol,
        ];
        Ok(FeatureVector::named(WINE_FEATURE_NAMES.iter().map(|n| n.to_string()).collect(), values))
    }
}
