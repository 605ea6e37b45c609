/// History record identifiers are monotonically increasing integers.
pub type HistoryId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
