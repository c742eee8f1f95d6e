//! Engine configuration.
//!
//! Everything the engine reads from the clinic's global settings: the local
//! timezone all calendar dates live in, the default search horizon, global
//! holiday specs, penalty offsets, and the two policy knobs.

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::conflict::ConflictScope;
use crate::error::{AgendaError, Result};

/// Days appended to the search start when neither the request nor the
/// configuration gives a horizon end.
pub const DEFAULT_HORIZON_DAYS: u32 = 60;

/// Day offsets applied to the search start for each penalty flag.
///
/// Non-positive offsets are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Penalties {
    pub asa_days: i64,
    pub ccr_days: i64,
}

/// What to do with a resource whose schedule has a malformed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MisconfigurationPolicy {
    /// Only the dates governed by the bad entry are lost.
    #[default]
    DegradeEntry,
    /// The whole resource is left out of the search.
    ExcludeResource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub timezone: Tz,
    pub horizon_end: Option<NaiveDate>,
    pub horizon_days: u32,
    pub holidays: Vec<String>,
    pub penalties: Penalties,
    pub conflict_scope: ConflictScope,
    pub misconfiguration: MisconfigurationPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            horizon_end: None,
            horizon_days: DEFAULT_HORIZON_DAYS,
            holidays: Vec::new(),
            penalties: Penalties::default(),
            conflict_scope: ConflictScope::default(),
            misconfiguration: MisconfigurationPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Replace the timezone by IANA name.
    ///
    /// # Errors
    /// Returns `AgendaError::InvalidTimezone` for an unknown zone.
    pub fn with_timezone_name(mut self, name: &str) -> Result<Self> {
        self.timezone = name
            .parse()
            .map_err(|_| AgendaError::InvalidTimezone(name.to_string()))?;
        Ok(self)
    }

    /// # Errors
    /// Returns `AgendaError::InvalidConfig` when no horizon can be derived.
    pub fn validate(&self) -> Result<()> {
        if self.horizon_end.is_none() && self.horizon_days == 0 {
            return Err(AgendaError::InvalidConfig(
                "horizonDays must be positive when horizonEnd is unset".to_string(),
            ));
        }
        Ok(())
    }
}
