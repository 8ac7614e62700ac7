//! Record-store contract and an in-memory implementation.

use std::collections::BTreeMap;
use std::sync::Mutex;

use thiserror::Error;
use uuid::Uuid;

use crate::{ValuationRecord, ValuationResult, VolatilityResult};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("valuation '{record_id}' already has an option value")]
    AlreadyValued { record_id: String },

    #[error("record store failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Persistence for valuations, comparables and volatility records.
pub trait RecordStore: Send + Sync {
    /// Every valuation record, valued or not, in no particular order.
    fn valuation_records(&self) -> Result<Vec<ValuationRecord>, StoreError>;

    /// Raw ticker of a comparable company.
    fn comparable_ticker(&self, comp_id: &str) -> Result<String, StoreError>;

    /// Persist one volatility and return its record id.
    fn create_volatility_record(&self, result: &VolatilityResult) -> Result<String, StoreError>;

    /// Write the option value, rate and volatility links back to a valuation.
    fn complete_valuation(
        &self,
        record_id: &str,
        result: &ValuationResult,
    ) -> Result<(), StoreError>;
}

pub fn new_volatility_id() -> String {
    format!("vol_{}", Uuid::new_v4().simple())
}

#[derive(Debug, Default)]
struct MemoryState {
    comps: BTreeMap<String, String>,
    valuations: BTreeMap<String, ValuationRecord>,
    volatilities: BTreeMap<String, VolatilityResult>,
    results: BTreeMap<String, ValuationResult>,
}

/// Record store held in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    state: Mutex<MemoryState>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_comparable(&self, comp_id: impl Into<String>, ticker: impl Into<String>) {
        self.lock().comps.insert(comp_id.into(), ticker.into());
    }

    pub fn insert_valuation(&self, record: ValuationRecord) {
        self.lock()
            .valuations
            .insert(record.record_id.clone(), record);
    }

    pub fn valuation(&self, record_id: &str) -> Option<ValuationRecord> {
        self.lock().valuations.get(record_id).cloned()
    }

    pub fn result(&self, record_id: &str) -> Option<ValuationResult> {
        self.lock().results.get(record_id).cloned()
    }

    pub fn volatility_records(&self) -> Vec<(String, VolatilityResult)> {
        self.lock()
            .volatilities
            .iter()
            .map(|(id, result)| (id.clone(), result.clone()))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .expect("memory record store lock is not poisoned")
    }
}

impl RecordStore for MemoryRecordStore {
    fn valuation_records(&self) -> Result<Vec<ValuationRecord>, StoreError> {
        Ok(self.lock().valuations.values().cloned().collect())
    }

    fn comparable_ticker(&self, comp_id: &str) -> Result<String, StoreError> {
        self.lock()
            .comps
            .get(comp_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "comparable",
                id: comp_id.to_owned(),
            })
    }

    fn create_volatility_record(&self, result: &VolatilityResult) -> Result<String, StoreError> {
        let id = new_volatility_id();
        self.lock().volatilities.insert(id.clone(), result.clone());
        Ok(id)
    }

    fn complete_valuation(
        &self,
        record_id: &str,
        result: &ValuationResult,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let record = state
            .valuations
            .get_mut(record_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "valuation",
                id: record_id.to_owned(),
            })?;
        if record.is_valued() {
            return Err(StoreError::AlreadyValued {
                record_id: record_id.to_owned(),
            });
        }
        record.option_value = Some(result.option_value);
        state.results.insert(record_id.to_owned(), result.clone());
        Ok(())
    }
}
