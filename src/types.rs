use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ---------- Input domains ----------

// Canonical bounds. The training data variants disagreed on the upper
// ends (20 vs 50 km, 29 vs 120 min); the union is authoritative.
pub const DISTANCE_KM_MIN: f64 = 0.1;
pub const DISTANCE_KM_MAX: f64 = 50.0;
pub const DISTANCE_KM_STEP: f64 = 0.1;
pub const DISTANCE_KM_DEFAULT: f64 = 7.93;

pub const PREP_TIME_MIN: u32 = 1;
pub const PREP_TIME_MAX: u32 = 120;
pub const PREP_TIME_DEFAULT: u32 = 12;

pub const EXPERIENCE_YRS_MIN: f64 = 0.0;
pub const EXPERIENCE_YRS_MAX: f64 = 9.0;
pub const EXPERIENCE_YRS_STEP: f64 = 0.5;
pub const EXPERIENCE_YRS_DEFAULT: f64 = 1.0;

pub const ACTUAL_TIME_MIN: u32 = 1;
pub const ACTUAL_TIME_MAX: u32 = 600;

pub const RATING_MIN: u8 = 1;
pub const RATING_MAX: u8 = 5;

// ---------- Categorical features ----------

// Spellings must match what the pipeline artifact was trained with.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weather {
    Windy,
    Clear,
    Foggy,
    Rainy,
    Snowy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrafficLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeOfDay {
    Afternoon,
    Evening,
    Night,
    Morning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleType {
    Scooter,
    Bike,
    Car,
}

macro_rules! categorical {
    ($ty:ident, [$($variant:ident),+]) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => stringify!($variant)),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(stringify!($variant) => Ok($ty::$variant),)+
                    other => Err(format!(
                        concat!("unknown ", stringify!($ty), " value '{}'"),
                        other
                    )),
                }
            }
        }
    };
}

categorical!(Weather, [Windy, Clear, Foggy, Rainy, Snowy]);
categorical!(TrafficLevel, [Low, Medium, High]);
categorical!(TimeOfDay, [Afternoon, Evening, Night, Morning]);
categorical!(VehicleType, [Scooter, Bike, Car]);

// ---------- Records ----------

#[derive(Debug, Error)]
#[error("{field} out of range: {value} (allowed {min}..={max})")]
pub struct OutOfRange {
    pub field: &'static str,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

/// One delivery described by the seven model inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    #[serde(rename = "Distance_km")]
    pub distance_km: f64,
    #[serde(rename = "Preparation_Time_min")]
    pub preparation_time_min: u32,
    #[serde(rename = "Courier_Experience_yrs")]
    pub courier_experience_yrs: f64,
    #[serde(rename = "Weather")]
    pub weather: Weather,
    #[serde(rename = "Traffic_Level")]
    pub traffic_level: TrafficLevel,
    #[serde(rename = "Time_of_Day")]
    pub time_of_day: TimeOfDay,
    #[serde(rename = "Vehicle_Type")]
    pub vehicle_type: VehicleType,
}

impl Default for FeatureRecord {
    fn default() -> Self {
        Self {
            distance_km: DISTANCE_KM_DEFAULT,
            preparation_time_min: PREP_TIME_DEFAULT,
            courier_experience_yrs: EXPERIENCE_YRS_DEFAULT,
            weather: Weather::Windy,
            traffic_level: TrafficLevel::Low,
            time_of_day: TimeOfDay::Afternoon,
            vehicle_type: VehicleType::Scooter,
        }
    }
}

impl FeatureRecord {
    /// Check all numeric values against the declared domains. Categorical
    /// fields cannot be out of range once deserialized.
    pub fn validate(&self) -> Result<(), OutOfRange> {
        check_range(
            "Distance_km",
            self.distance_km,
            DISTANCE_KM_MIN,
            DISTANCE_KM_MAX,
        )?;
        check_range(
            "Preparation_Time_min",
            f64::from(self.preparation_time_min),
            f64::from(PREP_TIME_MIN),
            f64::from(PREP_TIME_MAX),
        )?;
        check_range(
            "Courier_Experience_yrs",
            self.courier_experience_yrs,
            EXPERIENCE_YRS_MIN,
            EXPERIENCE_YRS_MAX,
        )?;
        Ok(())
    }

    /// Look up a numeric input by its artifact column name.
    pub fn numeric(&self, name: &str) -> Option<f64> {
        match name {
            "Distance_km" => Some(self.distance_km),
            "Preparation_Time_min" => Some(f64::from(self.preparation_time_min)),
            "Courier_Experience_yrs" => Some(self.courier_experience_yrs),
            _ => None,
        }
    }

    /// Look up a categorical input by its artifact column name.
    pub fn categorical(&self, name: &str) -> Option<&'static str> {
        match name {
            "Weather" => Some(self.weather.as_str()),
            "Traffic_Level" => Some(self.traffic_level.as_str()),
            "Time_of_Day" => Some(self.time_of_day.as_str()),
            "Vehicle_Type" => Some(self.vehicle_type.as_str()),
            _ => None,
        }
    }
}

pub(crate) fn check_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), OutOfRange> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

/// One accepted feedback row: the inputs that produced a prediction plus
/// what actually happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    #[serde(rename = "Timestamp")]
    pub timestamp: String, // "%Y-%m-%d %H:%M:%S"
    #[serde(rename = "Predicted_Time_min")]
    pub predicted_time_min: f64,
    #[serde(rename = "Actual_Time_min")]
    pub actual_time_min: u32,
    #[serde(rename = "Rating_Kurir")]
    pub rating_kurir: u8,
    #[serde(rename = "Komentar")]
    pub komentar: String,
    #[serde(flatten)]
    pub features: FeatureRecord,
}

// ---------- Request/Response types ----------

/// Body of a feedback submission. Carries the whole prediction context
/// back from the client so no server-side session state is needed.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackSubmission {
    #[serde(flatten)]
    pub features: FeatureRecord,
    #[serde(rename = "Predicted_Time_min")]
    pub predicted_time_min: f64,
    #[serde(rename = "Actual_Time_min")]
    pub actual_time_min: u32,
    #[serde(rename = "Rating_Kurir")]
    pub rating_kurir: u8,
    #[serde(rename = "Komentar", default)]
    pub komentar: String,
}

impl FeedbackSubmission {
    pub fn validate(&self) -> Result<(), OutOfRange> {
        self.features.validate()?;
        check_range(
            "Actual_Time_min",
            f64::from(self.actual_time_min),
            f64::from(ACTUAL_TIME_MIN),
            f64::from(ACTUAL_TIME_MAX),
        )?;
        check_range(
            "Rating_Kurir",
            f64::from(self.rating_kurir),
            f64::from(RATING_MIN),
            f64::from(RATING_MAX),
        )?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct PredictionOut {
    pub predicted_time_min: f64,
    pub ts_ms: i64,
}
