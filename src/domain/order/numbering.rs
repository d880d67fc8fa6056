use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::storage::StoreError;
use super::errors::OrderError;

// ============================================================================
// Order Numbering
// ============================================================================
//
// ORD + YYMMDD + 4-digit sequence, e.g. ORD2404150007.
//
// The sequence comes from a per-day counter that is incremented and read in
// one atomic step, so concurrent placements on the same day never observe
// the same value. Sequence 10000 and above cannot be formatted and fails
// closed instead of producing a longer number.
//
// ============================================================================

pub const MAX_DAILY_SEQUENCE: u32 = 9999;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn format(date: NaiveDate, sequence: u32) -> Result<Self, OrderError> {
        if sequence == 0 || sequence > MAX_DAILY_SEQUENCE {
            return Err(OrderError::SequenceExhausted(date));
        }
        Ok(Self(format!("ORD{}{:04}", date.format("%y%m%d"), sequence)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Day-scoped counter: returns 1 for the first call on a day, then 2, 3, ...
#[async_trait]
pub trait OrderSequence: Send + Sync {
    async fn next(&self, day: NaiveDate) -> Result<u32, StoreError>;
}

pub struct OrderNumbering {
    sequence: Arc<dyn OrderSequence>,
}

impl OrderNumbering {
    pub fn new(sequence: Arc<dyn OrderSequence>) -> Self {
        Self { sequence }
    }

    /// Allocate the next number for `day`; any counter failure is surfaced
    pub async fn assign(&self, day: NaiveDate) -> Result<OrderNumber, OrderError> {
        let sequence = self.sequence.next(day).await.map_err(|e| {
            tracing::error!(day = %day, error = %e, "Order sequence allocation failed");
            OrderError::from(e)
        })?;

        OrderNumber::format(day, sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryOrderSequence;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct FailingSequence;

    #[async_trait]
    impl OrderSequence for FailingSequence {
        async fn next(&self, _day: NaiveDate) -> Result<u32, StoreError> {
            Err(StoreError::Unavailable("counter offline".to_string()))
        }
    }

    #[test]
    fn test_format() {
        let number = OrderNumber::format(day(2024, 4, 15), 7).unwrap();
        assert_eq!(number.as_str(), "ORD2404150007");
        assert_eq!(
            OrderNumber::format(day(2031, 12, 1), 9999).unwrap().to_string(),
            "ORD3112019999"
        );
    }

    #[test]
    fn test_out_of_range_sequence_fails_closed() {
        assert!(matches!(
            OrderNumber::format(day(2024, 4, 15), 10_000),
            Err(OrderError::SequenceExhausted(_))
        ));
        assert!(OrderNumber::format(day(2024, 4, 15), 0).is_err());
    }

    #[tokio::test]
    async fn test_sequential_numbers_for_one_day() {
        let numbering = OrderNumbering::new(Arc::new(InMemoryOrderSequence::new()));
        let today = day(2025, 1, 9);

        let mut numbers = Vec::new();
        for _ in 0..5 {
            numbers.push(numbering.assign(today).await.unwrap().to_string());
        }

        assert_eq!(
            numbers,
            vec![
                "ORD2501090001",
                "ORD2501090002",
                "ORD2501090003",
                "ORD2501090004",
                "ORD2501090005"
            ]
        );
    }

    #[tokio::test]
    async fn test_sequence_restarts_each_day() {
        let numbering = OrderNumbering::new(Arc::new(InMemoryOrderSequence::new()));

        numbering.assign(day(2025, 1, 9)).await.unwrap();
        numbering.assign(day(2025, 1, 9)).await.unwrap();
        let next_day = numbering.assign(day(2025, 1, 10)).await.unwrap();

        assert_eq!(next_day.as_str(), "ORD2501100001");
    }

    #[tokio::test]
    async fn test_counter_failure_is_downstream() {
        let numbering = OrderNumbering::new(Arc::new(FailingSequence));
        let err = numbering.assign(day(2025, 1, 9)).await.unwrap_err();

        assert_eq!(err.kind(), crate::domain::order::ErrorKind::Downstream);
    }
}
