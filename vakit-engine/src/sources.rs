//! Typed access to the external data sources.
//!
//! Every payload is strictly deserialized into a wire envelope and then
//! validated into a domain value; nothing downstream ever touches a
//! loosely-shaped response. The [`SourceClient`] trait is the seam between
//! the pipeline and the transport, so tests drive the pipeline with
//! in-memory sources instead of sockets.

use crate::config::{EngineConfig, LocationConfig};
use crate::schedule::{DayMetadata, DaySchedule};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// A single fetch that did not produce a usable domain value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The source could not be reached or answered with a failure status.
    #[error("source unreachable: {0}")]
    Unreachable(String),
    /// The source answered, but the payload did not validate.
    #[error("payload malformed: {0}")]
    Malformed(String),
    /// The source is a defined extension point with no transport yet.
    #[error("source not implemented")]
    Unimplemented,
}

/// A point-in-time weather reading for a location.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    /// City name as reported by the weather source.
    pub city_name: String,
    pub temperature: f64,
    pub humidity: u32,
    pub description: String,
    /// Condition icon code, e.g. "10d".
    pub icon: String,
}

/// Which illustration a content item is displayed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentImageKey {
    Allah,
    Muhammad,
    Dua,
}

/// One entry of the rotating daily content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub title: String,
    pub body: String,
    pub source: String,
    pub image_key: ContentImageKey,
}

/// The transport seam the pipeline fetches through.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Fetches the day's schedule from the location's primary endpoint.
    async fn fetch_primary_schedule(
        &self,
        location: &LocationConfig,
    ) -> Result<DaySchedule, SourceError>;

    /// Fetches the day's schedule from the secondary source.
    async fn fetch_fallback_schedule(
        &self,
        location: &LocationConfig,
    ) -> Result<DaySchedule, SourceError>;

    /// Fetches the current weather for the location's city.
    async fn fetch_weather(
        &self,
        location: &LocationConfig,
    ) -> Result<WeatherSnapshot, SourceError>;

    /// Fetches the rotating daily content list.
    async fn fetch_daily_content(&self) -> Result<Vec<ContentItem>, SourceError>;
}

// --- Wire envelopes ---

#[derive(Debug, Deserialize)]
struct PrayerTimesEnvelope {
    success: bool,
    #[serde(default)]
    data: Vec<PrayerTimesRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrayerTimesRecord {
    fajr: String,
    sunrise: String,
    dhuhr: String,
    asr: String,
    maghrib: String,
    isha: String,
    #[serde(default)]
    hijri_date_long: Option<String>,
    #[serde(default)]
    hijri_date_short: Option<String>,
    #[serde(default)]
    gregorian_date_short: Option<String>,
    #[serde(default)]
    gregorian_date_long: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WeatherEnvelope {
    name: String,
    main: WeatherMainSection,
    #[serde(default)]
    weather: Vec<WeatherConditionSection>,
}

#[derive(Debug, Deserialize)]
struct WeatherMainSection {
    temp: f64,
    humidity: u32,
}

#[derive(Debug, Deserialize)]
struct WeatherConditionSection {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct DailyContentEnvelope {
    success: bool,
    data: Option<DailyContentRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DailyContentRecord {
    #[serde(default)]
    verse: Option<String>,
    #[serde(default)]
    verse_source: Option<String>,
    #[serde(default)]
    hadith: Option<String>,
    #[serde(default)]
    hadith_source: Option<String>,
    #[serde(default)]
    pray: Option<String>,
    #[serde(default)]
    pray_source: Option<String>,
}

// --- Envelope validation ---

fn schedule_from_envelope(envelope: PrayerTimesEnvelope) -> Result<DaySchedule, SourceError> {
    if !envelope.success {
        return Err(SourceError::Malformed("source reported success=false".into()));
    }
    let Some(record) = envelope.data.into_iter().next() else {
        return Err(SourceError::Malformed("empty data array".into()));
    };
    let metadata = DayMetadata {
        hijri_date_long: record.hijri_date_long,
        hijri_date_short: record.hijri_date_short,
        gregorian_date_short: record.gregorian_date_short,
        gregorian_date_long: record.gregorian_date_long,
    };
    DaySchedule::from_clock_times(
        [
            record.fajr.as_str(),
            record.sunrise.as_str(),
            record.dhuhr.as_str(),
            record.asr.as_str(),
            record.maghrib.as_str(),
            record.isha.as_str(),
        ],
        metadata,
    )
    .map_err(|e| SourceError::Malformed(e.to_string()))
}

fn weather_from_envelope(envelope: WeatherEnvelope) -> WeatherSnapshot {
    let condition = envelope.weather.into_iter().next();
    WeatherSnapshot {
        city_name: envelope.name,
        temperature: envelope.main.temp,
        humidity: envelope.main.humidity,
        description: condition
            .as_ref()
            .map(|c| c.description.clone())
            .unwrap_or_default(),
        icon: condition.map(|c| c.icon).unwrap_or_default(),
    }
}

fn content_from_envelope(envelope: DailyContentEnvelope) -> Result<Vec<ContentItem>, SourceError> {
    if !envelope.success {
        return Err(SourceError::Malformed("source reported success=false".into()));
    }
    let Some(record) = envelope.data else {
        return Err(SourceError::Malformed("missing data object".into()));
    };
    let trimmed = |field: Option<String>| field.map(|s| s.trim().to_string()).unwrap_or_default();
    // Fixed rotation order: verse, hadith, prayer.
    Ok(vec![
        ContentItem {
            title: "Âyet-i Kerîme".to_string(),
            body: trimmed(record.verse),
            source: trimmed(record.verse_source),
            image_key: ContentImageKey::Allah,
        },
        ContentItem {
            title: "Hadis-i Şerif".to_string(),
            body: trimmed(record.hadith),
            source: trimmed(record.hadith_source),
            image_key: ContentImageKey::Muhammad,
        },
        ContentItem {
            title: "Dua".to_string(),
            body: trimmed(record.pray),
            source: trimmed(record.pray_source),
            image_key: ContentImageKey::Dua,
        },
    ])
}

/// The production [`SourceClient`], fetching over HTTP.
pub struct HttpSources {
    client: reqwest::Client,
    config: EngineConfig,
}

impl HttpSources {
    /// Builds the shared HTTP client with the configured request timeout.
    pub fn new(config: &EngineConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, SourceError> {
        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SourceError::Unreachable(e.to_string()))?;
        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl SourceClient for HttpSources {
    async fn fetch_primary_schedule(
        &self,
        location: &LocationConfig,
    ) -> Result<DaySchedule, SourceError> {
        let envelope: PrayerTimesEnvelope =
            self.get_json(self.client.get(&location.prayer_api_url)).await?;
        schedule_from_envelope(envelope)
    }

    async fn fetch_fallback_schedule(
        &self,
        location: &LocationConfig,
    ) -> Result<DaySchedule, SourceError> {
        // The sheet-based secondary source is a defined extension point;
        // no transport for it exists yet.
        if let Some(sheet) = &location.fallback_sheet {
            warn!("fallback sheet '{sheet}' configured but no fallback transport is wired");
        }
        Err(SourceError::Unimplemented)
    }

    async fn fetch_weather(
        &self,
        location: &LocationConfig,
    ) -> Result<WeatherSnapshot, SourceError> {
        let weather = &self.config.weather;
        let request = self.client.get(&weather.endpoint).query(&[
            ("q", location.weather_city_name.as_str()),
            ("units", weather.units.as_str()),
            ("lang", weather.lang.as_str()),
            ("appid", weather.api_key.as_str()),
        ]);
        let envelope: WeatherEnvelope = self.get_json(request).await?;
        Ok(weather_from_envelope(envelope))
    }

    async fn fetch_daily_content(&self) -> Result<Vec<ContentItem>, SourceError> {
        let envelope: DailyContentEnvelope =
            self.get_json(self.client.get(&self.config.content_url)).await?;
        content_from_envelope(envelope)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory sources for pipeline and engine tests.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// A scriptable [`SourceClient`] whose four fetches return canned
    /// results, optionally after a per-call delay on the primary fetch.
    pub(crate) struct StubSources {
        pub primary: Mutex<Result<DaySchedule, SourceError>>,
        pub fallback: Result<DaySchedule, SourceError>,
        pub weather: Result<WeatherSnapshot, SourceError>,
        pub content: Result<Vec<ContentItem>, SourceError>,
        pub primary_delays: Mutex<Vec<Duration>>,
        pub primary_calls: AtomicUsize,
        pub fallback_calls: AtomicUsize,
    }

    impl StubSources {
        pub(crate) fn new(primary: Result<DaySchedule, SourceError>) -> Self {
            Self {
                primary: Mutex::new(primary),
                fallback: Err(SourceError::Unimplemented),
                weather: Err(SourceError::Unreachable("no weather stub".into())),
                content: Err(SourceError::Unreachable("no content stub".into())),
                primary_delays: Mutex::new(Vec::new()),
                primary_calls: AtomicUsize::new(0),
                fallback_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SourceClient for StubSources {
        async fn fetch_primary_schedule(
            &self,
            _location: &LocationConfig,
        ) -> Result<DaySchedule, SourceError> {
            self.primary_calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.primary_delays.lock().unwrap().pop();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.primary.lock().unwrap().clone()
        }

        async fn fetch_fallback_schedule(
            &self,
            _location: &LocationConfig,
        ) -> Result<DaySchedule, SourceError> {
            self.fallback_calls.fetch_add(1, Ordering::SeqCst);
            self.fallback.clone()
        }

        async fn fetch_weather(
            &self,
            _location: &LocationConfig,
        ) -> Result<WeatherSnapshot, SourceError> {
            self.weather.clone()
        }

        async fn fetch_daily_content(&self) -> Result<Vec<ContentItem>, SourceError> {
            self.content.clone()
        }
    }

    pub(crate) fn sample_weather() -> WeatherSnapshot {
        WeatherSnapshot {
            city_name: "Hannover".to_string(),
            temperature: 11.3,
            humidity: 82,
            description: "Leichter Regen".to_string(),
            icon: "10d".to_string(),
        }
    }
}
