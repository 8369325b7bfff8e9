mod config;
mod owner;
mod probe;
mod record;
mod walker;

pub use owner::{NoopOwnerResolver, OwnerError, OwnerResolver, SystemOwnerResolver};
pub use probe::{MetadataProbe, PROBE_WORKERS, ProbeError, probe_path};
pub use record::{FileRecord, MTIME_FORMAT, UNKNOWN_OWNER, format_mtime, size_in_kb, split_name};
pub use walker::{collect_files, walk_parallel};

#[cfg(unix)]
pub use owner::user_name;
