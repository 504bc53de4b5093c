use super::{SENTINEL_MTIME, SENTINEL_OWNER_ID, SENTINEL_OWNER_NAME};
use relay_core::{AnchoredPath, Error, Result};
use std::fs::{self, File, Metadata};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tar::{EntryType, Header};
use tracing::debug;

/// Serializes files below a root into a zstd-compressed tar stream.
pub struct ArchiveWriter<W: Write> {
    root: PathBuf,
    builder: tar::Builder<zstd::Encoder<'static, W>>,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(root: impl Into<PathBuf>, sink: W) -> Result<Self> {
        let encoder = zstd::Encoder::new(sink, 0)?;
        Ok(Self {
            root: root.into(),
            builder: tar::Builder::new(encoder),
        })
    }

    /// Append one path. Symlinks are stored, never followed.
    pub fn add_file(&mut self, path: &AnchoredPath) -> Result<()> {
        let source = path.resolve(&self.root)?;
        let metadata = fs::symlink_metadata(&source)?;
        let file_type = metadata.file_type();

        let mut header = sentinel_header(&metadata)?;

        if file_type.is_symlink() {
            let target = fs::read_link(&source)?;
            let target = canonical_link_target(&target, path)?;
            debug!(path = %path, target = %target, "Archiving symlink");

            header.set_entry_type(EntryType::Symlink);
            header.set_size(0);
            self.builder
                .append_link(&mut header, path.as_str(), target.as_str())?;
        } else if file_type.is_dir() {
            debug!(path = %path, "Archiving directory");

            header.set_entry_type(EntryType::Directory);
            header.set_size(0);
            let name = format!("{}/", path.as_str());
            self.builder
                .append_data(&mut header, name.as_str(), io::empty())?;
        } else if file_type.is_file() {
            let declared = metadata.len();
            debug!(path = %path, size = declared, "Archiving file");

            header.set_entry_type(EntryType::Regular);
            header.set_size(declared);
            self.append_file_body(&mut header, path, &source, declared)?;
        } else {
            return Err(Error::UnsupportedFileType {
                path: path.to_string(),
                kind: format!("{:?}", file_type),
            });
        }

        Ok(())
    }

    fn append_file_body(
        &mut self,
        header: &mut Header,
        path: &AnchoredPath,
        source: &Path,
        declared: u64,
    ) -> Result<()> {
        let mut body = ExactReader::new(File::open(source)?, declared);
        let appended = self
            .builder
            .append_data(header, path.as_str(), &mut body);

        if body.remaining > 0 {
            return Err(Error::EntrySizeMismatch {
                path: path.to_string(),
                declared,
                actual: declared - body.remaining,
            });
        }
        appended?;

        let extra = io::copy(&mut body.inner, &mut io::sink())?;
        if extra > 0 {
            return Err(Error::EntrySizeMismatch {
                path: path.to_string(),
                declared,
                actual: declared + extra,
            });
        }
        Ok(())
    }

    /// Write the end-of-archive marker and flush the compressor.
    pub fn finish(self) -> Result<W> {
        let encoder = self.builder.into_inner()?;
        Ok(encoder.finish()?)
    }
}

fn sentinel_header(metadata: &Metadata) -> Result<Header> {
    let mut header = Header::new_gnu();
    header.set_mode(permission_bits(metadata));
    header.set_mtime(SENTINEL_MTIME);
    if let Some(gnu) = header.as_gnu_mut() {
        gnu.set_atime(SENTINEL_MTIME);
        gnu.set_ctime(SENTINEL_MTIME);
    }
    header.set_uid(SENTINEL_OWNER_ID);
    header.set_gid(SENTINEL_OWNER_ID);
    header.set_username(SENTINEL_OWNER_NAME)?;
    header.set_groupname(SENTINEL_OWNER_NAME)?;
    Ok(header)
}

#[cfg(unix)]
fn permission_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(metadata: &Metadata) -> u32 {
    if metadata.is_dir() || metadata.file_type().is_symlink() {
        0o755
    } else if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// Link targets are stored verbatim apart from separator normalization.
fn canonical_link_target(target: &Path, link: &AnchoredPath) -> Result<String> {
    let target = target.to_str().ok_or_else(|| {
        Error::InvalidPath(format!("symlink {} has a non UTF-8 target", link))
    })?;
    Ok(if cfg!(windows) {
        target.replace('\\', "/")
    } else {
        target.to_string()
    })
}

/// Yields exactly `remaining` bytes of `inner`, stopping short only if
/// `inner` runs dry first.
struct ExactReader<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> ExactReader<R> {
    fn new(inner: R, remaining: u64) -> Self {
        Self { inner, remaining }
    }
}

impl<R: Read> Read for ExactReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let max = buf.len().min(self.remaining.min(usize::MAX as u64) as usize);
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file shrank while it was being archived",
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}
