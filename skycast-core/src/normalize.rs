//! Turns the model's loosely-shaped JSON into the typed weather model.
//!
//! The upstream is a generative model, not a schema-enforcing API, so every
//! raw field is optional and ingestion fills the documented defaults. Wind
//! speed and direction are always recomputed from the (u, v) vector
//! components, never trusted from the payload.

use serde::Deserialize;

use crate::{
    client::GenerateReply,
    error::WeatherError,
    model::{ForecastDay, HourlyForecast, WeatherSnapshot},
};

/// speed = sqrt(u^2 + v^2) rounded to 2 decimals;
/// direction = (atan2(-u, -v) in degrees + 360) mod 360, rounded, in [0, 360).
pub fn wind_metrics(u: f64, v: f64) -> (f64, u32) {
    let speed = (u * u + v * v).sqrt();
    let direction = ((-u).atan2(-v).to_degrees() + 360.0) % 360.0;

    let speed = (speed * 100.0).round() / 100.0;
    // Rounding 359.6 yields 360, fold it back into range.
    let direction = (direction.round() as u32) % 360;

    (speed, direction)
}

/// Parse a model reply body into a normalized snapshot, attaching the reply's
/// grounding sources.
pub fn snapshot_from_reply(reply: &GenerateReply) -> Result<WeatherSnapshot, WeatherError> {
    let body = strip_json_fences(&reply.text);
    let raw: RawSnapshot = serde_json::from_str(body)
        .map_err(|e| WeatherError::ParseFailed(format!("weather payload: {e}")))?;

    let mut snapshot = raw.normalize();
    snapshot.sources = reply.sources.clone();
    Ok(snapshot)
}

/// Strips ```json ... ``` or ``` ... ``` code fences the model sometimes
/// wraps JSON bodies in.
pub(crate) fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSnapshot {
    city: String,
    temp: f64,
    feels_like: f64,
    condition: String,
    description: String,
    humidity: f64,
    pressure: f64,
    high: f64,
    low: f64,
    uv_index: f64,
    visibility: f64,
    timezone: String,
    u_wind: Option<f64>,
    v_wind: Option<f64>,
    precip_amount: Option<f64>,
    snow_amount: Option<f64>,
    cloud_cover: Option<f64>,
    aqi: Option<f64>,
    alerts: Option<Vec<String>>,
    thunderstorm: Option<String>,
    forecast: Vec<RawPeriod>,
    hourly: Vec<RawPeriod>,
}

/// Shared raw shape for daily and hourly entries; they differ only in their
/// period label.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawPeriod {
    day: String,
    date: Option<String>,
    time: String,
    temp: f64,
    high: f64,
    low: f64,
    feels_like: f64,
    condition: String,
    description: Option<String>,
    humidity: f64,
    pressure: f64,
    precip: f64,
    precip_amount: Option<f64>,
    snow_amount: Option<f64>,
    uv_index: f64,
    visibility: f64,
    u_wind: Option<f64>,
    v_wind: Option<f64>,
    cloud_cover: Option<f64>,
    aqi: Option<f64>,
    thunderstorm: Option<String>,
}

impl RawSnapshot {
    fn normalize(self) -> WeatherSnapshot {
        let u = self.u_wind.unwrap_or(0.0);
        let v = self.v_wind.unwrap_or(0.0);
        let (wind_speed, wind_direction) = wind_metrics(u, v);

        WeatherSnapshot {
            city: self.city,
            temp: self.temp,
            feels_like: self.feels_like,
            condition: self.condition,
            description: self.description,
            humidity: self.humidity,
            pressure: self.pressure,
            high: self.high,
            low: self.low,
            uv_index: self.uv_index,
            visibility: self.visibility,
            timezone: self.timezone,
            u_wind: u,
            v_wind: v,
            wind_speed,
            wind_direction,
            precip_amount: self.precip_amount.unwrap_or(0.0),
            snow_amount: self.snow_amount.unwrap_or(0.0),
            cloud_cover: self.cloud_cover.unwrap_or(0.0),
            aqi: self.aqi.unwrap_or(0.0),
            alerts: self.alerts.unwrap_or_default(),
            thunderstorm: self.thunderstorm.unwrap_or_else(|| "None".to_string()),
            forecast: self.forecast.into_iter().map(RawPeriod::into_day).collect(),
            hourly: self.hourly.into_iter().map(RawPeriod::into_hour).collect(),
            sources: Vec::new(),
        }
    }
}

impl RawPeriod {
    fn into_day(self) -> ForecastDay {
        let u = self.u_wind.unwrap_or(0.0);
        let v = self.v_wind.unwrap_or(0.0);
        let (wind_speed, wind_direction) = wind_metrics(u, v);

        ForecastDay {
            day: self.day,
            date: self.date,
            temp: self.temp,
            high: self.high,
            low: self.low,
            feels_like: self.feels_like,
            condition: self.condition,
            description: self.description,
            humidity: self.humidity,
            pressure: self.pressure,
            precip: self.precip,
            precip_amount: self.precip_amount.unwrap_or(0.0),
            snow_amount: self.snow_amount.unwrap_or(0.0),
            uv_index: self.uv_index,
            visibility: self.visibility,
            u_wind: u,
            v_wind: v,
            wind_speed,
            wind_direction,
            cloud_cover: self.cloud_cover.unwrap_or(0.0),
            aqi: self.aqi.unwrap_or(0.0),
            thunderstorm: self.thunderstorm.unwrap_or_else(|| "None".to_string()),
        }
    }

    fn into_hour(self) -> HourlyForecast {
        let u = self.u_wind.unwrap_or(0.0);
        let v = self.v_wind.unwrap_or(0.0);
        let (wind_speed, wind_direction) = wind_metrics(u, v);

        HourlyForecast {
            time: self.time,
            temp: self.temp,
            feels_like: self.feels_like,
            condition: self.condition,
            precip: self.precip,
            precip_amount: self.precip_amount.unwrap_or(0.0),
            snow_amount: self.snow_amount.unwrap_or(0.0),
            humidity: self.humidity,
            pressure: self.pressure,
            uv_index: self.uv_index,
            visibility: self.visibility,
            u_wind: u,
            v_wind: v,
            wind_speed,
            wind_direction,
            cloud_cover: self.cloud_cover.unwrap_or(0.0),
            aqi: self.aqi.unwrap_or(0.0),
            thunderstorm: self.thunderstorm.unwrap_or_else(|| "None".to_string()),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::client::GenerateReply;

    /// Minimal but fully normalized snapshot for tests across the crate.
    pub(crate) fn sample_snapshot() -> WeatherSnapshot {
        sample_snapshot_for("Paris")
    }

    pub(crate) fn sample_snapshot_for(city: &str) -> WeatherSnapshot {
        let reply = GenerateReply {
            text: format!(
                r#"{{"city":"{city}","temp":21.0,"feelsLike":20.0,"condition":"Clear",
                    "description":"Sunny","humidity":40.0,"pressure":1013.0,"high":24.0,
                    "low":14.0,"uvIndex":5.0,"visibility":10.0,"timezone":"Europe/Paris",
                    "uWind":3.0,"vWind":4.0,"forecast":[],"hourly":[]}}"#
            ),
            ..GenerateReply::default()
        };
        snapshot_from_reply(&reply).expect("sample payload must normalize")
    }
}
