use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::otp_store::OtpStore;
use crate::errors::Result;
use crate::models::otp::{OtpKey, OtpRecord};

/// In-process `OtpStore` with the same overwrite and consume semantics as the Postgres table.
#[derive(Default)]
pub struct MemoryOtpStore {
    records: RwLock<HashMap<OtpKey, OtpRecord>>,
}

impl MemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    async fn upsert(&self, record: &OtpRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn find(&self, key: &OtpKey) -> Result<Option<OtpRecord>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn record_failed_attempt(
        &self,
        key: &OtpKey,
        stored_code: &str,
        max_attempts: u32,
    ) -> Result<Option<u32>> {
        let mut records = self.records.write().await;
        match records.get_mut(key) {
            Some(record) if record.code == stored_code && record.failed_attempts < max_attempts => {
                record.failed_attempts += 1;
                Ok(Some(record.failed_attempts))
            }
            _ => Ok(None),
        }
    }

    async fn consume(&self, key: &OtpKey, code: &str, max_attempts: u32) -> Result<bool> {
        let mut records = self.records.write().await;
        match records.get_mut(key) {
            Some(record)
                if record.code == code
                    && !record.consumed
                    && record.failed_attempts < max_attempts =>
            {
                record.consumed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        Ok((before - records.len()) as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::otp::{Purpose, Role};
    use chrono::Duration;

    async fn seeded(code: &str) -> (MemoryOtpStore, OtpKey) {
        let store = MemoryOtpStore::new();
        let key = OtpKey::new("a@x.com", Role::Patient, Purpose::parse("registration").unwrap());
        let record = OtpRecord::issue(key.clone(), code.to_string(), Utc::now(), Duration::minutes(5));
        store.upsert(&record).await.unwrap();
        (store, key)
    }

    #[tokio::test]
    async fn consume_needs_the_stored_code_and_works_once() {
        let (store, key) = seeded("482193").await;

        assert!(!store.consume(&key, "000000", 5).await.unwrap());
        assert!(!store.find(&key).await.unwrap().unwrap().consumed);

        assert!(store.consume(&key, "482193", 5).await.unwrap());
        assert!(!store.consume(&key, "482193", 5).await.unwrap());
        assert!(store.find(&key).await.unwrap().unwrap().consumed);

        let missing = OtpKey::new("b@x.com", Role::Patient, Purpose::parse("registration").unwrap());
        assert!(!store.consume(&missing, "482193", 5).await.unwrap());
    }

    #[tokio::test]
    async fn failed_attempts_are_capped_and_tied_to_the_code() {
        let (store, key) = seeded("111111").await;

        assert_eq!(store.record_failed_attempt(&key, "111111", 2).await.unwrap(), Some(1));
        assert_eq!(store.record_failed_attempt(&key, "111111", 2).await.unwrap(), Some(2));
        assert_eq!(store.record_failed_attempt(&key, "111111", 2).await.unwrap(), None);
        assert_eq!(store.find(&key).await.unwrap().unwrap().failed_attempts, 2);

        // Locked records refuse even the right code
        assert!(!store.consume(&key, "111111", 2).await.unwrap());

        // A guess judged against a replaced code is not counted
        let fresh = OtpRecord::issue(key.clone(), "222222".into(), Utc::now(), Duration::minutes(5));
        store.upsert(&fresh).await.unwrap();
        assert_eq!(store.record_failed_attempt(&key, "111111", 2).await.unwrap(), None);
        assert_eq!(store.find(&key).await.unwrap().unwrap().failed_attempts, 0);
    }
}
