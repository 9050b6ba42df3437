//! The data acquisition pipeline: one run per location change or midnight.
//!
//! A run resolves the schedule through the primary/fallback chain and, in
//! parallel, fetches the two auxiliary data sets. Auxiliary failures are
//! contained to their own field; only the schedule chain can escalate, and
//! only when both of its sources have failed.

use crate::config::LocationConfig;
use crate::schedule::DaySchedule;
use crate::sources::{ContentItem, SourceClient, SourceError, WeatherSnapshot};
use thiserror::Error;
use tracing::{debug, warn};

/// Both schedule sources failed; there is no primary content to display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schedule unavailable (primary: {primary}; fallback: {fallback})")]
pub struct ScheduleUnavailable {
    pub primary: SourceError,
    pub fallback: SourceError,
}

/// Independently-fetched optional data riding alongside the schedule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuxiliaryData {
    pub weather: Option<WeatherSnapshot>,
    pub daily_content: Option<Vec<ContentItem>>,
}

/// The settled outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    pub schedule: Option<DaySchedule>,
    /// Set only when the whole schedule chain failed.
    pub schedule_error: Option<ScheduleUnavailable>,
    pub weather: Option<WeatherSnapshot>,
    pub daily_content: Option<Vec<ContentItem>>,
}

/// Runs one full acquisition for the given location.
///
/// Returns once the schedule chain and both auxiliary fetches have all
/// settled, whatever their individual outcomes.
pub async fn load(sources: &dyn SourceClient, location: &LocationConfig) -> PipelineResult {
    let schedule_chain = async {
        match sources.fetch_primary_schedule(location).await {
            Ok(schedule) => {
                debug!("primary schedule source succeeded");
                (Some(schedule), None)
            }
            Err(primary) => {
                warn!("primary schedule source failed ({primary}), trying fallback");
                match sources.fetch_fallback_schedule(location).await {
                    Ok(schedule) => {
                        debug!("fallback schedule source succeeded");
                        (Some(schedule), None)
                    }
                    Err(fallback) => (None, Some(ScheduleUnavailable { primary, fallback })),
                }
            }
        }
    };

    let weather = async {
        sources
            .fetch_weather(location)
            .await
            .map_err(|e| warn!("weather fetch failed: {e}"))
            .ok()
    };

    let daily_content = async {
        sources
            .fetch_daily_content()
            .await
            .map_err(|e| warn!("daily content fetch failed: {e}"))
            .ok()
    };

    let ((schedule, schedule_error), weather, daily_content) =
        tokio::join!(schedule_chain, weather, daily_content);

    PipelineResult {
        schedule,
        schedule_error,
        weather,
        daily_content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::DayMetadata;
    use crate::sources::testing::{sample_weather, StubSources};
    use std::sync::atomic::Ordering;

    fn sample_schedule() -> DaySchedule {
        DaySchedule::new([300, 390, 720, 930, 1080, 1170], DayMetadata::default()).unwrap()
    }

    fn location() -> LocationConfig {
        LocationConfig {
            mosque_name: "HANNOVER ŞUBESİ AYASOFYA CÂMİ-İ".to_string(),
            weather_city_name: "Hannover".to_string(),
            prayer_api_url: "http://localhost:9999/hannover".to_string(),
            fallback_sheet: Some("hannover".to_string()),
        }
    }

    #[tokio::test]
    async fn primary_success_skips_the_fallback() {
        let sources = StubSources::new(Ok(sample_schedule()));
        let result = load(&sources, &location()).await;
        assert_eq!(result.schedule, Some(sample_schedule()));
        assert_eq!(result.schedule_error, None);
        assert_eq!(sources.fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fallback_covers_a_failed_primary() {
        let mut sources =
            StubSources::new(Err(SourceError::Unreachable("connection refused".into())));
        sources.fallback = Ok(sample_schedule());
        let result = load(&sources, &location()).await;
        assert_eq!(result.schedule, Some(sample_schedule()));
        assert_eq!(result.schedule_error, None);
        assert_eq!(sources.fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn both_sources_failing_escalates_without_losing_auxiliary_data() {
        let mut sources =
            StubSources::new(Err(SourceError::Unreachable("timed out".into())));
        sources.weather = Ok(sample_weather());
        let result = load(&sources, &location()).await;
        assert_eq!(result.schedule, None);
        assert_eq!(
            result.schedule_error,
            Some(ScheduleUnavailable {
                primary: SourceError::Unreachable("timed out".into()),
                fallback: SourceError::Unimplemented,
            })
        );
        // The independent weather fetch still lands.
        assert_eq!(result.weather, Some(sample_weather()));
    }

    #[tokio::test]
    async fn auxiliary_failure_never_blocks_the_schedule() {
        let sources = StubSources::new(Ok(sample_schedule()));
        let result = load(&sources, &location()).await;
        assert_eq!(result.schedule, Some(sample_schedule()));
        assert_eq!(result.weather, None);
        assert_eq!(result.daily_content, None);
        assert_eq!(result.schedule_error, None);
    }

    #[tokio::test]
    async fn repeated_loads_are_idempotent() {
        let sources = StubSources::new(Ok(sample_schedule()));
        let first = load(&sources, &location()).await;
        let second = load(&sources, &location()).await;
        assert_eq!(first.schedule, second.schedule);
        assert_eq!(sources.primary_calls.load(Ordering::SeqCst), 2);
    }
}
