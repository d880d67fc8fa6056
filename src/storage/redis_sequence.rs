use async_trait::async_trait;
use chrono::NaiveDate;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::domain::order::OrderSequence;
use super::StoreError;

/// Keys outlive their day so a late retry still sees the counter
const KEY_TTL_SECS: i64 = 3 * 24 * 60 * 60;

/// Per-day counter on `INCR`, which is atomic on the server
#[derive(Clone)]
pub struct RedisOrderSequence {
    connection: MultiplexedConnection,
    prefix: String,
}

impl RedisOrderSequence {
    pub async fn connect(url: &str, prefix: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;

        tracing::info!(prefix = %prefix, "Connected to Redis order sequence");
        Ok(Self {
            connection,
            prefix: prefix.to_string(),
        })
    }

    fn key(&self, day: NaiveDate) -> String {
        sequence_key(&self.prefix, day)
    }
}

fn sequence_key(prefix: &str, day: NaiveDate) -> String {
    format!("{}:{}", prefix, day.format("%y%m%d"))
}

#[async_trait]
impl OrderSequence for RedisOrderSequence {
    async fn next(&self, day: NaiveDate) -> Result<u32, StoreError> {
        let key = self.key(day);
        let mut connection = self.connection.clone();

        let value: i64 = connection.incr(&key, 1).await?;
        if value == 1 {
            let _: bool = connection.expire(&key, KEY_TTL_SECS).await?;
        }

        u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("order sequence {} at {}", value, key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_day_scoped() {
        let day = NaiveDate::from_ymd_opt(2024, 4, 15).unwrap();
        assert_eq!(sequence_key("order-seq", day), "order-seq:240415");
    }
}
