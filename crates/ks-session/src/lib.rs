//! Load, edit, and persist KML documents as one session.

pub mod config;
pub mod loader;
pub mod session;

pub use config::JobConfig;
pub use config::StyleConfig;
pub use loader::HttpFetcher;
pub use loader::KmlSource;
pub use loader::Loader;
pub use loader::RemoteFetcher;
pub use session::EditSession;
pub use session::JobReport;
pub use session::run_job;
pub use session::run_job_with;
