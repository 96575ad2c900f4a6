use serde::{Deserialize, Serialize};

/// Full current-conditions-plus-forecast bundle for one city at one fetch
/// time, as normalized by the orchestrator.
///
/// Field names serialize in camelCase to keep the cache payload identical to
/// the shape the dashboard front end consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    /// City name in the casing the model echoed back, not the search input.
    pub city: String,
    pub temp: f64,
    pub feels_like: f64,
    pub condition: String,
    pub description: String,
    pub humidity: f64,
    pub pressure: f64,
    pub high: f64,
    pub low: f64,
    pub uv_index: f64,
    pub visibility: f64,
    /// IANA timezone identifier.
    pub timezone: String,
    /// Zonal wind component.
    pub u_wind: f64,
    /// Meridional wind component.
    pub v_wind: f64,
    /// Derived from (uWind, vWind) at ingestion, never trusted upstream.
    pub wind_speed: f64,
    /// Derived bearing in degrees, always in [0, 360).
    pub wind_direction: u32,
    pub precip_amount: f64,
    pub snow_amount: f64,
    pub cloud_cover: f64,
    pub aqi: f64,
    #[serde(default)]
    pub alerts: Vec<String>,
    pub thunderstorm: String,
    pub forecast: Vec<ForecastDay>,
    pub hourly: Vec<HourlyForecast>,
    /// Grounding citations attached by the model, empty when none.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceRef>,
}

/// One day of the 7-entry daily forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastDay {
    pub day: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub temp: f64,
    pub high: f64,
    pub low: f64,
    pub feels_like: f64,
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub humidity: f64,
    pub pressure: f64,
    /// Precipitation probability in percent, distinct from the amount.
    pub precip: f64,
    pub precip_amount: f64,
    pub snow_amount: f64,
    pub uv_index: f64,
    pub visibility: f64,
    pub u_wind: f64,
    pub v_wind: f64,
    pub wind_speed: f64,
    pub wind_direction: u32,
    pub cloud_cover: f64,
    pub aqi: f64,
    pub thunderstorm: String,
}

/// One hour of the 24-entry hourly forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyForecast {
    pub time: String,
    pub temp: f64,
    pub feels_like: f64,
    pub condition: String,
    pub precip: f64,
    pub precip_amount: f64,
    pub snow_amount: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub uv_index: f64,
    pub visibility: f64,
    pub u_wind: f64,
    pub v_wind: f64,
    pub wind_speed: f64,
    pub wind_direction: u32,
    pub cloud_cover: f64,
    pub aqi: f64,
    pub thunderstorm: String,
}

/// A grounding citation the model consulted for an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub uri: String,
    pub title: String,
}

/// Cached snapshot plus its capture time in epoch milliseconds.
///
/// Serialized shape is `{ "data": ..., "timestamp": ... }`, matching the
/// dashboard's persisted cache entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: WeatherSnapshot,
    pub timestamp: i64,
}

impl CacheEntry {
    /// Freshness window for a cached snapshot.
    pub const FRESH_TTL_MS: i64 = 30 * 60 * 1000;

    pub fn is_fresh(&self, now_ms: i64) -> bool {
        now_ms - self.timestamp < Self::FRESH_TTL_MS
    }
}

/// One point of a historical or predicted time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPoint {
    pub label: String,
    pub value: f64,
}

/// Weather parameter an analysis series can be requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisParameter {
    Temp,
    FeelsLike,
    Humidity,
    WindSpeed,
    WindDirection,
    Pressure,
    PrecipAmount,
    CloudCover,
    Visibility,
    Aqi,
    SnowAmount,
    UWind,
    VWind,
}

impl AnalysisParameter {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisParameter::Temp => "temp",
            AnalysisParameter::FeelsLike => "feelsLike",
            AnalysisParameter::Humidity => "humidity",
            AnalysisParameter::WindSpeed => "windSpeed",
            AnalysisParameter::WindDirection => "windDirection",
            AnalysisParameter::Pressure => "pressure",
            AnalysisParameter::PrecipAmount => "precipAmount",
            AnalysisParameter::CloudCover => "cloudCover",
            AnalysisParameter::Visibility => "visibility",
            AnalysisParameter::Aqi => "aqi",
            AnalysisParameter::SnowAmount => "snowAmount",
            AnalysisParameter::UWind => "uWind",
            AnalysisParameter::VWind => "vWind",
        }
    }

    pub const fn all() -> &'static [AnalysisParameter] {
        &[
            AnalysisParameter::Temp,
            AnalysisParameter::FeelsLike,
            AnalysisParameter::Humidity,
            AnalysisParameter::WindSpeed,
            AnalysisParameter::WindDirection,
            AnalysisParameter::Pressure,
            AnalysisParameter::PrecipAmount,
            AnalysisParameter::CloudCover,
            AnalysisParameter::Visibility,
            AnalysisParameter::Aqi,
            AnalysisParameter::SnowAmount,
            AnalysisParameter::UWind,
            AnalysisParameter::VWind,
        ]
    }
}

impl std::fmt::Display for AnalysisParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AnalysisParameter {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        AnalysisParameter::all()
            .iter()
            .find(|p| p.as_str().to_lowercase() == lower)
            .copied()
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown analysis parameter '{value}'. Supported: temp, feelsLike, humidity, \
                     windSpeed, windDirection, pressure, precipAmount, cloudCover, visibility, \
                     aqi, snowAmount, uWind, vWind."
                )
            })
    }
}

/// Interval granularity of an analysis series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Resolution {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Daily => "Daily",
            Resolution::Weekly => "Weekly",
            Resolution::Monthly => "Monthly",
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Resolution {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "daily" => Ok(Resolution::Daily),
            "weekly" => Ok(Resolution::Weekly),
            "monthly" => Ok(Resolution::Monthly),
            _ => Err(anyhow::anyhow!(
                "Unknown resolution '{value}'. Supported resolutions: daily, weekly, monthly."
            )),
        }
    }
}

/// Role of a conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One turn of the assistant conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceRef>,
}

/// Assistant answer plus the optional city side-channel extracted from a
/// model tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub text: String,
    pub sources: Vec<SourceRef>,
    pub city_to_update: Option<String>,
}
