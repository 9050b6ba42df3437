//! Defines all configuration structures for the Vakit engine.
//!
//! These structs are designed to be deserialized from a configuration file
//! (e.g., a TOML file) using `serde`. The built-in location table covers
//! the deployed sites; a config file can override both the table and the
//! ambient engine settings.

use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

/// The top-level configuration: ambient engine settings plus the location
/// table. This struct is the entry point for all settings and is typically
/// loaded from a TOML file at application startup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VakitConfig {
    pub engine: EngineConfig,
    pub locations: LocationRegistry,
}

impl VakitConfig {
    /// Loads the configuration, merging an optional TOML file over the
    /// built-in defaults. A missing file is not an error.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder.build()?.try_deserialize()
    }
}

/// Ambient settings shared by every location session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// The timezone the engine operates in for phase and midnight
    /// calculations. Uses IANA Time Zone Database names
    /// (e.g., "Europe/Berlin").
    pub timezone: Tz,
    /// Per-request timeout applied to every outbound fetch.
    pub request_timeout_ms: u64,
    pub weather: WeatherConfig,
    /// Endpoint serving the rotating daily content.
    pub content_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            request_timeout_ms: 10_000,
            weather: WeatherConfig::default(),
            content_url: "https://igmg-namaz.synology.me:3838/getIslamContent".to_string(),
        }
    }
}

/// Settings for the weather source (OpenWeatherMap-shaped).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub endpoint: String,
    /// API key for the weather source. Left empty, weather fetches fail
    /// and the snapshot stays absent; the schedule is unaffected.
    pub api_key: String,
    pub units: String,
    pub lang: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openweathermap.org/data/2.5/weather".to_string(),
            api_key: String::new(),
            units: "metric".to_string(),
            lang: "de".to_string(),
        }
    }
}

fn default_timezone() -> Tz {
    chrono_tz::Europe::Berlin
}

/// The immutable per-location configuration, looked up by identifier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LocationConfig {
    /// Display name of the site, shown in the header.
    pub mosque_name: String,
    /// City name the weather source is queried with.
    pub weather_city_name: String,
    /// Endpoint serving the day's schedule for this location.
    pub prayer_api_url: String,
    /// Sheet identifier for the secondary schedule source, if any.
    #[serde(default)]
    pub fallback_sheet: Option<String>,
}

/// A location identifier that is not in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown location '{0}'")]
pub struct UnknownLocation(pub String);

/// The static table mapping opaque location identifiers to configurations.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct LocationRegistry {
    locations: HashMap<String, LocationConfig>,
}

impl LocationRegistry {
    /// Pure lookup: identifier to configuration. No I/O, no side effects.
    pub fn resolve(&self, identifier: &str) -> Result<&LocationConfig, UnknownLocation> {
        self.locations
            .get(identifier)
            .ok_or_else(|| UnknownLocation(identifier.to_string()))
    }

    /// Identifiers of every known location, unordered.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.locations.keys().map(String::as_str)
    }
}

impl Default for LocationRegistry {
    fn default() -> Self {
        // (identifier, site name, weather city). The schedule endpoint and
        // fallback sheet both derive from the identifier.
        const SITES: [(&str, &str, &str); 17] = [
            ("hannover", "HANNOVER ŞUBESİ AYASOFYA CÂMİ-İ", "Hannover"),
            ("braunschweig", "BRAUNSCHWEIG CAMİ", "Braunschweig"),
            ("garbsen", "GARBSEN CAMİ", "Garbsen"),
            ("laatzen", "LAATZEN CAMİ", "Laatzen"),
            ("neustadt", "NEUSTADT CAMİ", "Neustadt am Rübenberge"),
            ("peine", "PEINE CAMİ", "Peine"),
            ("salzgitterBad", "SALZGITTER-BAD CAMİ", "Salzgitter"),
            ("salzgitter", "SALZGITTER CAMİ", "Salzgitter"),
            ("watenstedt", "WATENSTEDT CAMİ", "Salzgitter-Watenstedt"),
            ("hildesheim", "HILDESHEIM CAMİ", "Hildesheim"),
            ("goslar", "GOSLAR CAMİ", "Goslar"),
            ("hameln", "HAMELN CAMİ", "Hameln"),
            ("stadthagen", "STADTHAGEN CAMİ", "Stadthagen"),
            ("osterode", "OSTERODE CAMİ", "Osterode am Harz"),
            ("herzberg", "HERZBERG CAMİ", "Herzberg am Harz"),
            ("magdeburg", "MAGDEBURG CAMİ", "Magdeburg"),
            ("wolfsburg", "WOLFSBURG CAMİ", "Wolfsburg"),
        ];
        let locations = SITES
            .into_iter()
            .map(|(key, mosque, city)| {
                (
                    key.to_string(),
                    LocationConfig {
                        mosque_name: mosque.to_string(),
                        weather_city_name: city.to_string(),
                        prayer_api_url: format!("https://igmg-namaz.synology.me:3838/{key}"),
                        fallback_sheet: Some(key.to_string()),
                    },
                )
            })
            .collect();
        Self { locations }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_location() {
        let registry = LocationRegistry::default();
        let config = registry.resolve("hannover").unwrap();
        assert_eq!(config.weather_city_name, "Hannover");
        assert_eq!(
            config.prayer_api_url,
            "https://igmg-namaz.synology.me:3838/hannover"
        );
        assert_eq!(config.fallback_sheet.as_deref(), Some("hannover"));
    }

    #[test]
    fn unknown_location_is_a_typed_failure() {
        let registry = LocationRegistry::default();
        assert_eq!(
            registry.resolve("atlantis"),
            Err(UnknownLocation("atlantis".to_string()))
        );
    }

    #[test]
    fn defaults_cover_every_deployed_site() {
        let registry = LocationRegistry::default();
        assert_eq!(registry.identifiers().count(), 17);
    }

    #[test]
    fn config_file_overrides_the_table() {
        let toml = r#"
            [engine]
            timezone = "UTC"

            [locations.testtown]
            mosque_name = "TESTTOWN CAMİ"
            weather_city_name = "Testtown"
            prayer_api_url = "http://localhost:9999/testtown"
        "#;
        let parsed: VakitConfig = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(parsed.engine.timezone, chrono_tz::Tz::UTC);
        let site = parsed.locations.resolve("testtown").unwrap();
        assert_eq!(site.fallback_sheet, None);
        assert!(parsed.locations.resolve("hannover").is_err());
    }

    #[test]
    fn engine_defaults_match_the_deployment_locale() {
        let engine = EngineConfig::default();
        assert_eq!(engine.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(engine.weather.units, "metric");
        assert_eq!(engine.weather.lang, "de");
    }
}
