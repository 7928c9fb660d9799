use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Param, Skill, SkillFunction, ToolArgs, ToolOutput, ToolSchema};
use crate::error::{JarvisError, Result};

const OPENWEATHERMAP_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Current conditions from OpenWeatherMap.
pub struct WeatherSkill {
    service: Arc<WeatherService>,
}

impl WeatherSkill {
    pub fn new(api_key: Option<String>, default_city: Option<String>, country: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| JarvisError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            service: Arc::new(WeatherService {
                client,
                base_url: OPENWEATHERMAP_URL.to_string(),
                api_key,
                default_city,
                country: country.to_string(),
            }),
        })
    }
}

impl Skill for WeatherSkill {
    fn name(&self) -> &str {
        "weather_skill"
    }

    fn functions(&self) -> Vec<Arc<dyn SkillFunction>> {
        vec![
            Arc::new(GetWeather(self.service.clone())),
            Arc::new(CurrentLocationWeather(self.service.clone())),
        ]
    }
}

struct WeatherService {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    default_city: Option<String>,
    country: String,
}

#[derive(Deserialize)]
struct WeatherResponse {
    name: String,
    sys: Sys,
    main: Main,
    weather: Vec<Condition>,
    wind: Wind,
}

#[derive(Deserialize)]
struct Sys {
    #[serde(default)]
    country: String,
}

#[derive(Deserialize)]
struct Main {
    temp: f64,
    feels_like: f64,
    humidity: u32,
}

#[derive(Deserialize)]
struct Condition {
    description: String,
}

#[derive(Deserialize)]
struct Wind {
    speed: f64,
}

impl WeatherService {
    /// Query parameters for a lookup.  A pincode wins over the city, and an
    /// all-digit city is treated as a postal code.
    fn location_query(&self, city: Option<&str>, pincode: Option<&str>) -> Option<(&'static str, String)> {
        let pincode = pincode.map(str::trim).filter(|p| !p.is_empty());
        let city = city.map(str::trim).filter(|c| !c.is_empty());

        match (pincode, city) {
            (Some(pin), _) => Some(("zip", format!("{pin},{}", self.country))),
            (None, Some(c)) if c.chars().all(|ch| ch.is_ascii_digit()) => {
                Some(("zip", format!("{c},{}", self.country)))
            }
            (None, Some(c)) => Some(("q", c.to_string())),
            (None, None) => None,
        }
    }

    async fn lookup(&self, city: Option<&str>, pincode: Option<&str>) -> ToolOutput {
        let Some(api_key) = self.api_key.as_deref() else {
            return ToolOutput::error(
                "Weather service is not configured. Please add the OpenWeatherMap API key.",
            );
        };

        let Some((key, location)) = self.location_query(city, pincode) else {
            return ToolOutput::error("city or pincode is required");
        };

        debug!(%location, "fetching weather");

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("appid", api_key), ("units", "metric"), (key, location.as_str())])
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "weather request failed");
                return ToolOutput::error("I encountered an error while fetching the weather.");
            }
        };

        if !resp.status().is_success() {
            debug!(status = %resp.status(), %location, "weather lookup rejected");
            let shown = city.or(pincode).unwrap_or(location.as_str());
            return ToolOutput::error(format!(
                "I couldn't find the weather for {shown}. Please try another location."
            ));
        }

        match resp.json::<WeatherResponse>().await {
            Ok(data) => ToolOutput::ok(describe(&data)),
            Err(e) => {
                warn!(error = %e, "unexpected weather response");
                ToolOutput::error("I encountered an error while fetching the weather.")
            }
        }
    }
}

fn describe(data: &WeatherResponse) -> String {
    let condition = data
        .weather
        .first()
        .map(|c| title_case(&c.description))
        .unwrap_or_else(|| "Unknown".to_string());

    format!(
        "The current weather in {}, {} is {}. The temperature is {:.1}°C, feels like {:.1}°C, \
         with humidity at {}% and wind speed of {} meters per second.",
        data.name,
        data.sys.country,
        condition,
        data.main.temp,
        data.main.feels_like,
        data.main.humidity,
        data.wind.speed,
    )
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// -- GetWeather ----------------------------------------------------------

struct GetWeather(Arc<WeatherService>);

#[async_trait]
impl SkillFunction for GetWeather {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "get_weather",
            "Get current weather information for a city or pincode",
        )
        .param(Param::string("city").describe("City name or pincode").required())
        .param(Param::string("pincode").describe("Optional pincode (takes precedence)"))
    }

    async fn call(&self, args: ToolArgs) -> Result<ToolOutput> {
        Ok(self.0.lookup(args.str("city"), args.str("pincode")).await)
    }
}

// -- CurrentLocationWeather ----------------------------------------------

struct CurrentLocationWeather(Arc<WeatherService>);

#[async_trait]
impl SkillFunction for CurrentLocationWeather {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "get_current_location_weather",
            "Get weather for the default configured location",
        )
    }

    async fn call(&self, _args: ToolArgs) -> Result<ToolOutput> {
        match self.0.default_city.as_deref() {
            Some(city) => Ok(self.0.lookup(Some(city), None).await),
            None => Ok(ToolOutput::error("No default location is configured.")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> WeatherService {
        WeatherService {
            client: Client::new(),
            base_url: OPENWEATHERMAP_URL.to_string(),
            api_key: None,
            default_city: None,
            country: "in".to_string(),
        }
    }

    #[test]
    fn location_query_rules() {
        let s = service();
        assert_eq!(s.location_query(Some("Mumbai"), None), Some(("q", "Mumbai".into())));
        assert_eq!(s.location_query(Some("400001"), None), Some(("zip", "400001,in".into())));
        assert_eq!(
            s.location_query(Some("Mumbai"), Some("110001")),
            Some(("zip", "110001,in".into()))
        );
        assert_eq!(s.location_query(None, Some(" 560001 ")), Some(("zip", "560001,in".into())));
        assert_eq!(s.location_query(Some("  "), None), None);
        assert_eq!(s.location_query(None, None), None);
    }

    #[test]
    fn title_case_words() {
        assert_eq!(title_case("scattered clouds"), "Scattered Clouds");
        assert_eq!(title_case("HAZE"), "Haze");
    }

    #[test]
    fn describe_formats_sentence() {
        let data: WeatherResponse = serde_json::from_value(serde_json::json!({
            "name": "Mumbai",
            "sys": {"country": "IN"},
            "main": {"temp": 31.04, "feels_like": 36.2, "humidity": 70},
            "weather": [{"description": "light rain"}],
            "wind": {"speed": 4.1}
        }))
        .unwrap();
        let text = describe(&data);
        assert!(text.starts_with("The current weather in Mumbai, IN is Light Rain."));
        assert!(text.contains("31.0°C"));
        assert!(text.contains("feels like 36.2°C"));
        assert!(text.contains("humidity at 70%"));
    }

    #[tokio::test]
    async fn missing_api_key_is_reported() {
        let skill = WeatherSkill::new(None, Some("Mumbai".into()), "in").unwrap();
        let map = skill.function_map();
        let mut args = ToolArgs::new();
        args.set("city", "Mumbai");
        let out = map["get_weather"].call(args).await.unwrap();
        assert!(!out.success);
        assert!(out.output.contains("not configured"));
    }

    #[tokio::test]
    async fn current_location_without_default() {
        let skill = WeatherSkill::new(Some("key".into()), None, "in").unwrap();
        let map = skill.function_map();
        let out = map["get_current_location_weather"].call(ToolArgs::new()).await.unwrap();
        assert!(!out.success);
        assert!(out.output.contains("No default location"));
    }

    #[test]
    fn schema_marks_city_required() {
        let skill = WeatherSkill::new(None, None, "in").unwrap();
        let schemas = skill.tool_schemas();
        assert_eq!(schemas[0].name, "get_weather");
        assert_eq!(schemas[0].required_params(), vec!["city"]);
        assert_eq!(schemas[1].name, "get_current_location_weather");
    }

    #[test]
    fn constructor_keeps_configuration() {
        let skill = WeatherSkill::new(Some("key".into()), Some("Pune".into()), "us")
            .expect("client builds with a timeout");
        assert_eq!(skill.service.api_key.as_deref(), Some("key"));
        assert_eq!(skill.service.default_city.as_deref(), Some("Pune"));
        assert_eq!(skill.service.country, "us");
        assert_eq!(skill.service.base_url, OPENWEATHERMAP_URL);
    }
}
