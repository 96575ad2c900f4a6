//! Prompt builders for every model call the core issues.

use crate::{
    client::{FunctionDecl, GenerateRequest, PromptMessage, PromptRole},
    model::{AnalysisParameter, ChatMessage, ChatRole, Resolution, WeatherSnapshot},
};

/// Request for current conditions plus a 7-day and 24-hour outlook, asked for
/// as a JSON body with search grounding enabled.
pub fn weather_request(city: &str) -> GenerateRequest {
    let prompt = format!(
        r#"Latest weather JSON for {city}. Include 7 days for forecast.
{{
  "city": string, "temp": num, "feelsLike": num, "condition": string, "description": string,
  "humidity": num, "pressure": num, "uvIndex": num, "visibility": num, "timezone": string,
  "uWind": num, "vWind": num, "high": num, "low": num, "precipAmount": num, "snowAmount": num,
  "cloudCover": num, "aqi": num, "alerts": string[], "thunderstorm": string,
  "forecast": [7]{{day, date, temp, high, low, feelsLike, condition, humidity, pressure, precip, precipAmount, snowAmount, uvIndex, visibility, uWind, vWind, cloudCover, aqi, thunderstorm}},
  "hourly": [24]{{time, temp, feelsLike, condition, precip, precipAmount, snowAmount, humidity, pressure, uvIndex, visibility, uWind, vWind, cloudCover, aqi, thunderstorm}}
}}"#
    );

    GenerateRequest {
        messages: vec![PromptMessage::user(prompt)],
        json_response: true,
        search_grounding: true,
        ..GenerateRequest::default()
    }
}

/// Request a synthesized historical series for one parameter.
pub fn historical_request(
    city: &str,
    parameter: AnalysisParameter,
    start: &str,
    end: &str,
    resolution: Resolution,
) -> GenerateRequest {
    let prompt = format!(
        "Generate historical weather data for {city} for the parameter {parameter} \
         from {start} to {end} in {resolution} intervals. \
         Return as JSON array of {{label: string, value: number}}."
    );

    GenerateRequest {
        messages: vec![PromptMessage::user(prompt)],
        json_response: true,
        ..GenerateRequest::default()
    }
}

/// Request a synthesized prediction series for one parameter.
pub fn prediction_request(
    city: &str,
    parameter: AnalysisParameter,
    start: &str,
    end: &str,
    resolution: Resolution,
) -> GenerateRequest {
    let prompt = format!(
        "Generate predicted weather trends for {city} for the parameter {parameter} \
         from {start} to {end} in {resolution} intervals. \
         Return as JSON array of {{label: string, value: number}}."
    );

    GenerateRequest {
        messages: vec![PromptMessage::user(prompt)],
        json_response: true,
        ..GenerateRequest::default()
    }
}

/// Name of the tool the assistant may call to switch the dashboard city.
pub const UPDATE_CITY_TOOL: &str = "update_city_dashboard";

/// Conversation request for the weather assistant: full history, contextual
/// system instruction, and the dashboard tool.
///
/// Search grounding stays off here; the Gemini API rejects it alongside
/// function declarations.
pub fn assistant_request(
    history: &[ChatMessage],
    weather: Option<&WeatherSnapshot>,
) -> GenerateRequest {
    let context = weather
        .map(|w| format!("Current context: {}, {}°C, {}.", w.city, w.temp, w.condition))
        .unwrap_or_default();

    let system = format!(
        "You are SkyCast AI, a weather expert. {context} Be concise. \
         Use the tool to update the dashboard if the user wants to see weather for another city."
    );

    let messages = history
        .iter()
        .map(|m| PromptMessage {
            role: match m.role {
                ChatRole::User => PromptRole::User,
                ChatRole::Assistant => PromptRole::Model,
            },
            text: m.content.clone(),
        })
        .collect();

    GenerateRequest {
        messages,
        system: Some(system),
        functions: vec![FunctionDecl {
            name: UPDATE_CITY_TOOL.to_string(),
            description: "Update the main dashboard to show weather for a specific city.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "city": {
                        "type": "string",
                        "description": "The name of the city to display weather for."
                    }
                },
                "required": ["city"]
            }),
        }],
        ..GenerateRequest::default()
    }
}
