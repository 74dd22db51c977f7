// ============================================================================
// Statistics aggregation
// ============================================================================

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::storage::models::format_date;
use crate::storage::statistics::StatisticsRepository;
use crate::storage::{Storage, UserStatistics};

pub struct StatisticsAggregator {
    storage: Arc<Storage>,
}

impl StatisticsAggregator {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Recomputes the daily row for the day `ended_at` falls on. Called once
    /// per completed session; recomputation makes repeats harmless.
    pub fn refresh_for_day(
        &self,
        user_id: &str,
        ended_at: DateTime<Utc>,
    ) -> EngineResult<UserStatistics> {
        let day = format_date(&ended_at);
        let now = Utc::now();
        let stats = self.storage.transaction(|conn| {
            StatisticsRepository::refresh_daily_internal(conn, user_id, &day, now)
        })?;
        debug!(
            user_id,
            day = %day,
            sessions = stats.total_sessions,
            words = stats.total_words,
            "daily statistics refreshed"
        );
        Ok(stats)
    }

    /// Daily rows in [from, to], oldest first. Days without completed
    /// sessions are absent.
    pub fn daily_range(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<Vec<UserStatistics>> {
        if from > to {
            return Err(EngineError::validation("statistics range is inverted"));
        }
        let rows = self.storage.statistics().range_daily(
            user_id,
            &from.format("%Y-%m-%d").to_string(),
            &to.format("%Y-%m-%d").to_string(),
        )?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_range_is_rejected() {
        let aggregator = StatisticsAggregator::new(Arc::new(Storage::in_memory().unwrap()));
        let from = NaiveDate::from_ymd_opt(2026, 5, 10).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        assert!(aggregator.daily_range("u1", from, to).is_err());
    }

    #[test]
    fn empty_history_yields_no_rows() {
        let aggregator = StatisticsAggregator::new(Arc::new(Storage::in_memory().unwrap()));
        let day = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        assert!(aggregator.daily_range("u1", day, day).unwrap().is_empty());
    }
}
