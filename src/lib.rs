pub mod config;
pub mod error;
pub mod extract;
pub mod load;
pub mod parse;
pub mod record;
pub mod remote;
pub mod watch;

pub use config::Config;
pub use error::{Result, TabloadError};
pub use load::{BatchLoader, LoadResult};
pub use record::{Period, Record};
pub use remote::{PostgrestClient, RemoteApi};
pub use watch::{ArchiveJob, JobState, Watcher};
