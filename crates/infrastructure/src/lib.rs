pub mod http_agent;
pub mod sqlite_audit;

pub use http_agent::HttpExtractionAgent;
pub use sqlite_audit::SqliteAuditStore;
