use crate::{DynamyteError, Result};
use serde::{Deserialize, Serialize};

/// Scalar causal version attached to every stored value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionContext {
    pub version: u64,
}

impl VersionContext {
    pub fn new(version: u64) -> Self {
        Self { version }
    }

    pub fn is_more_recent(&self, other: &VersionContext) -> bool {
        self.version > other.version
    }

    /// Advances past both contexts. Commutative; the losing write is not kept.
    /// Fails without modifying `self` once the version space is exhausted.
    pub fn merge(&mut self, other: &VersionContext) -> Result<()> {
        self.version = self
            .version
            .max(other.version)
            .checked_add(1)
            .ok_or_else(|| {
                DynamyteError::InvalidRequest("Context version out of range".to_string())
            })?;
        Ok(())
    }

    pub fn merged(&self, other: &VersionContext) -> Result<VersionContext> {
        let mut merged = *self;
        merged.merge(other)?;
        Ok(merged)
    }

    pub fn stale_reason(&self, supplied: &VersionContext) -> String {
        format!(
            "stale context: stored version {} is newer than {}",
            self.version, supplied.version
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedValue {
    pub value: serde_json::Value,
    pub context: VersionContext,
}

impl VersionedValue {
    pub fn new(value: serde_json::Value, context: VersionContext) -> Self {
        Self { value, context }
    }

    /// Applies a write carrying the caller's context. Returns `Ok(false)`,
    /// leaving the value untouched, when the stored context is strictly newer.
    pub fn write(&mut self, value: serde_json::Value, supplied: &VersionContext) -> Result<bool> {
        if self.context.is_more_recent(supplied) {
            return Ok(false);
        }

        self.context.merge(supplied)?;
        self.value = value;
        Ok(true)
    }
}

impl Default for VersionedValue {
    fn default() -> Self {
        Self::new(serde_json::Value::Null, VersionContext::default())
    }
}
