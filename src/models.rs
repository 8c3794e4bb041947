use std::time::Duration;

use serde::Deserialize;

use crate::error::ApiError;

/// Root of a document in the store's path syntax
pub const ROOT_PATH: &str = ".";

/// Index sentinel meaning "append to the end" on insert
pub const APPEND_INDEX: i64 = -1;

/// Default pop position
pub const DEFAULT_POP_INDEX: i64 = 0;

/// Query parameters for raw SET
///
/// Values are kept as strings so malformed input can be reported through
/// the error envelope rather than the extractor's own rejection.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RawSetQuery {
    /// Expiration in seconds; 0 or absent keeps the value forever
    pub ttl: Option<String>,
}

impl RawSetQuery {
    pub fn ttl(&self) -> Result<Option<Duration>, ApiError> {
        let Some(raw) = &self.ttl else {
            return Ok(None);
        };
        let seconds = raw
            .parse::<i64>()
            .map_err(|e| ApiError::InvalidTtl(e.to_string()))?;
        if seconds < 0 {
            return Err(ApiError::InvalidTtl(format!(
                "ttl must not be negative, got {}",
                seconds
            )));
        }
        Ok((seconds > 0).then(|| Duration::from_secs(seconds as u64)))
    }
}

/// Query parameters for document GET/SET
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DocumentQuery {
    /// Location inside the document, defaults to the root `.`
    pub path: Option<String>,
}

impl DocumentQuery {
    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or(ROOT_PATH)
    }
}

/// Query parameters for array pop/insert
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ArrayQuery {
    /// Location of the array inside the document, defaults to the root `.`
    pub path: Option<String>,
    /// Element position; negative values count from the end
    pub index: Option<String>,
}

impl ArrayQuery {
    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or(ROOT_PATH)
    }

    /// Parses `index`, falling back to `default` when it is absent.
    pub fn index_or(&self, default: i64) -> Result<i64, ApiError> {
        match &self.index {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|e| ApiError::InvalidIndex(e.to_string())),
            None => Ok(default),
        }
    }
}
