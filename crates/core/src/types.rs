/// Global event sequence numbers. Allocated exclusively by the event bus;
/// one monotonic counter across all sessions.
pub type Seq = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
