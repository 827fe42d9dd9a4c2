/// Opaque identifier correlating a submission with its progress channel
/// and its artifact. Assigned by the service at submission time.
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
