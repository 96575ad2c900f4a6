use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use skycast_core::{
    AnalysisParameter, AnalysisPoint, Assistant, ChatMessage, ChatRole, Config, FileStore,
    GeminiClient, Resolution, WeatherService, WeatherSnapshot,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skycast", version, about = "Model-synthesized weather dashboard")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the Gemini API key and optional model override.
    Configure,

    /// Show current conditions and the 7-day forecast for a city.
    Show {
        /// City name.
        city: String,

        /// Also print the 24-hour series.
        #[arg(long)]
        hourly: bool,
    },

    /// Synthesized historical series for one weather parameter.
    History {
        city: String,

        /// Parameter name, e.g. "temp", "humidity", "windSpeed".
        parameter: String,

        /// Range start (YYYY-MM-DD).
        start: NaiveDate,

        /// Range end (YYYY-MM-DD).
        end: NaiveDate,

        /// Interval: daily, weekly or monthly.
        #[arg(long, default_value = "daily")]
        resolution: String,
    },

    /// Synthesized prediction series for one weather parameter.
    Predict {
        city: String,
        parameter: String,
        start: NaiveDate,
        end: NaiveDate,
        #[arg(long, default_value = "daily")]
        resolution: String,
    },

    /// Talk to the SkyCast weather assistant.
    Chat,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city, hourly } => {
                let (service, _) = build_service()?;
                let snapshot = service.fetch(&city).await?;
                print_snapshot(&snapshot, hourly);
                Ok(())
            }
            Command::History {
                city,
                parameter,
                start,
                end,
                resolution,
            } => {
                let (service, _) = build_service()?;
                let parameter = AnalysisParameter::try_from(parameter.as_str())?;
                let resolution = Resolution::try_from(resolution.as_str())?;
                let points = service
                    .fetch_historical(&city, parameter, start, end, resolution)
                    .await;
                print_series(&city, parameter, &points);
                Ok(())
            }
            Command::Predict {
                city,
                parameter,
                start,
                end,
                resolution,
            } => {
                let (service, _) = build_service()?;
                let parameter = AnalysisParameter::try_from(parameter.as_str())?;
                let resolution = Resolution::try_from(resolution.as_str())?;
                let points = service
                    .fetch_predicted(&city, parameter, start, end, resolution)
                    .await;
                print_series(&city, parameter, &points);
                Ok(())
            }
            Command::Chat => chat().await,
        }
    }
}

/// Construct the orchestrator from stored configuration.
fn build_service() -> Result<(WeatherService, Arc<GeminiClient>)> {
    let config = Config::load()?;
    let api_key = config.resolved_api_key()?;

    let client = Arc::new(GeminiClient::with_model(
        api_key,
        config.model_name().to_string(),
    ));
    let store = Arc::new(FileStore::new(Config::cache_file_path()?));

    Ok((WeatherService::new(client.clone(), store), client))
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = inquire::Text::new("Gemini API key:").prompt()?;
    config.set_api_key(api_key.trim().to_string());

    let model = inquire::Text::new("Model (leave empty for default):").prompt()?;
    let model = model.trim();
    config.model = (!model.is_empty()).then(|| model.to_string());

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn chat() -> Result<()> {
    let (service, client) = build_service()?;
    let assistant = Assistant::new(client);

    let mut history: Vec<ChatMessage> = Vec::new();
    let mut weather: Option<WeatherSnapshot> = None;

    println!("SkyCast assistant. Empty input or \"exit\" to quit.");
    loop {
        let input = inquire::Text::new("You:").prompt()?;
        let input = input.trim().to_string();
        if input.is_empty() || input == "exit" {
            return Ok(());
        }

        history.push(ChatMessage {
            role: ChatRole::User,
            content: input,
            timestamp: Utc::now().timestamp_millis(),
            sources: Vec::new(),
        });

        let reply = assistant.reply(&history, weather.as_ref()).await;
        println!("SkyCast: {}", reply.text);
        for source in &reply.sources {
            println!("  [{}] {}", source.title, source.uri);
        }

        history.push(ChatMessage {
            role: ChatRole::Assistant,
            content: reply.text.clone(),
            timestamp: Utc::now().timestamp_millis(),
            sources: reply.sources.clone(),
        });

        if let Some(city) = reply.city_to_update {
            match service.fetch(&city).await {
                Ok(snapshot) => {
                    print_snapshot(&snapshot, false);
                    weather = Some(snapshot);
                }
                Err(err) => eprintln!("Could not load weather for {city}: {err}"),
            }
        }
    }
}

fn print_snapshot(snapshot: &WeatherSnapshot, hourly: bool) {
    println!(
        "{} - {} ({})",
        snapshot.city, snapshot.condition, snapshot.description
    );
    println!(
        "  {:.1}°C (feels like {:.1}°C), high {:.1}°C / low {:.1}°C",
        snapshot.temp, snapshot.feels_like, snapshot.high, snapshot.low
    );
    println!(
        "  wind {:.2} m/s from {}°, humidity {:.0}%, pressure {:.0} hPa",
        snapshot.wind_speed, snapshot.wind_direction, snapshot.humidity, snapshot.pressure
    );
    println!(
        "  UV {:.0}, visibility {:.0} km, cloud cover {:.0}%, AQI {:.0}",
        snapshot.uv_index, snapshot.visibility, snapshot.cloud_cover, snapshot.aqi
    );
    if snapshot.precip_amount > 0.0 || snapshot.snow_amount > 0.0 {
        println!(
            "  precipitation {:.1} mm, snow {:.1} mm",
            snapshot.precip_amount, snapshot.snow_amount
        );
    }
    if snapshot.thunderstorm != "None" {
        println!("  thunderstorm: {}", snapshot.thunderstorm);
    }
    for alert in &snapshot.alerts {
        println!("  ALERT: {alert}");
    }

    if !snapshot.forecast.is_empty() {
        println!("Forecast:");
        for day in &snapshot.forecast {
            println!(
                "  {:<10} {:>5.1}°C  high {:>5.1}  low {:>5.1}  {:>3.0}% precip  {}",
                day.day, day.temp, day.high, day.low, day.precip, day.condition
            );
        }
    }

    if hourly && !snapshot.hourly.is_empty() {
        println!("Hourly:");
        for hour in &snapshot.hourly {
            println!(
                "  {:<6} {:>5.1}°C  {:>3.0}% precip  {}",
                hour.time, hour.temp, hour.precip, hour.condition
            );
        }
    }

    if !snapshot.sources.is_empty() {
        println!("Sources:");
        for source in &snapshot.sources {
            println!("  [{}] {}", source.title, source.uri);
        }
    }
}

fn print_series(city: &str, parameter: AnalysisParameter, points: &[AnalysisPoint]) {
    if points.is_empty() {
        println!("No data available for {parameter} in {city}.");
        return;
    }

    println!("{parameter} for {city}:");
    for point in points {
        println!("  {:<12} {:.2}", point.label, point.value);
    }
}
