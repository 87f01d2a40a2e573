use std::fmt;
use thiserror::Error;

/// Why a single record was not written to the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    CategoryUnbound,
    NameFiltered,
    YearFiltered,
    RecordLocked,
    NoRuleConfigured,
    NoChangedFields,
    NotConfiguredToInsert,
    NotConfiguredToUpdate,
}

impl SkipReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CategoryUnbound => "categoryUnbound",
            Self::NameFiltered => "nameFiltered",
            Self::YearFiltered => "yearFiltered",
            Self::RecordLocked => "recordLocked",
            Self::NoRuleConfigured => "noRuleConfigured",
            Self::NoChangedFields => "noChangedFields",
            Self::NotConfiguredToInsert => "notConfiguredToInsert",
            Self::NotConfiguredToUpdate => "notConfiguredToUpdate",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the collection pipeline.
///
/// `RecordSkipped`, `ImageSyncFailure` and `StoreWriteFailure` are scoped to a
/// single record and never end a run. `NetworkFailure` and `MalformedFeed`
/// end the run at the current page. `UnsafeTarget` refuses the run outright.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Network failure fetching {url}: {reason}")]
    NetworkFailure { url: String, reason: String },

    #[error("Malformed feed: {0}")]
    MalformedFeed(String),

    #[error("Refusing to fetch from loopback target: {0}")]
    UnsafeTarget(String),

    #[error("Record skipped: {0}")]
    RecordSkipped(SkipReason),

    #[error("Image sync failed for {url}: {reason}")]
    ImageSyncFailure { url: String, reason: String },

    #[error("Store write failed: {0}")]
    StoreWriteFailure(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Source not found: {0}")]
    SourceNotFound(i32),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CollectError {
    /// True for failures that only concern the record being processed.
    #[must_use]
    pub const fn is_record_scoped(&self) -> bool {
        matches!(
            self,
            Self::RecordSkipped(_) | Self::ImageSyncFailure { .. } | Self::StoreWriteFailure(_)
        )
    }

    pub(crate) fn network(url: &str, reason: impl fmt::Display) -> Self {
        Self::NetworkFailure {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<sea_orm::DbErr> for CollectError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for CollectError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

pub type CollectResult<T> = Result<T, CollectError>;
