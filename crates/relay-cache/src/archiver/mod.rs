//! Deterministic archive codec for cache artifacts.
//!
//! Artifacts are GNU tar streams wrapped in zstd. Every header carries the
//! same timestamps and ownership regardless of who produced it, so packing
//! the same tree twice yields byte-identical output.

mod reader;
mod writer;

pub use reader::{ArchiveReader, PendingSymlink};
pub use writer::ArchiveWriter;

use relay_core::{AnchoredPath, Result};
use std::io::{Read, Write};
use std::path::Path;

/// Timestamp stamped on every entry: 2000-01-01T00:00:00Z.
pub const SENTINEL_MTIME: u64 = 946_684_800;

/// uid/gid of the conventional `nobody` user.
pub const SENTINEL_OWNER_ID: u64 = 65_534;

pub const SENTINEL_OWNER_NAME: &str = "nobody";

/// Mode used for every directory created during restore.
pub const RESTORED_DIR_MODE: u32 = 0o775;

/// Pack `files` (anchored at `root`) into `sink`, returning the sink once the
/// compressed stream is complete.
pub fn pack<W: Write>(root: &Path, files: &[AnchoredPath], sink: W) -> Result<W> {
    let mut writer = ArchiveWriter::new(root, sink)?;
    for file in files {
        writer.add_file(file)?;
    }
    writer.finish()
}

/// Restore the archive read from `source` below `root`.
pub fn restore<R: Read>(root: &Path, source: R) -> Result<Vec<AnchoredPath>> {
    ArchiveReader::new(source)?.restore(root)
}
