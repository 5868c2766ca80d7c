//! Capture files to in-memory [`Capture`] arenas, with a parse cache.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Instant, SystemTime};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::decode::{FrameContext, decode_packet};
use crate::metadata::CaptureMetadata;
use crate::model::Capture;
use crate::source::pcap::layout::MIN_CAPTURE_FILE_LEN;
use crate::source::pcap::reader::is_capture_magic;
use crate::source::{PacketSource, PcapFileSource, SourceError};

const CAPTURE_EXTENSIONS: [&str; 3] = ["pcap", "pcapng", "cap"];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("capture file not found: {0}")]
    NotFound(PathBuf),
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: SourceError,
    },
}

/// A decoded capture together with its metadata.
#[derive(Debug, Clone)]
pub struct LoadedCapture {
    pub capture: Capture,
    pub metadata: CaptureMetadata,
}

/// Drain a packet source into a capture, decoding every frame.
pub fn read_capture<S: PacketSource>(source: &mut S) -> Result<Capture, SourceError> {
    read_capture_with_progress(source, 0, |_, _| {})
}

/// Like [`read_capture`], reporting `(decoded, total)` after every frame.
///
/// `progress` is only called when `total` is non-zero.
pub fn read_capture_with_progress<S, F>(
    source: &mut S,
    total: u64,
    mut progress: F,
) -> Result<Capture, SourceError>
where
    S: PacketSource,
    F: FnMut(u64, u64),
{
    let mut capture = Capture::new();
    let mut context = FrameContext::new();
    while let Some(event) = source.next_packet()? {
        capture.push_packet(decode_packet(&event, &mut context));
        if total > 0 {
            progress(context.frames(), total);
        }
    }
    Ok(capture)
}

/// Read and decode one capture file, without caching.
pub fn load_capture(path: &Path) -> Result<LoadedCapture, IngestError> {
    load_counted(path, 0, |_, _| {})
}

/// Read and decode one capture file, reporting progress against a packet
/// count taken in a first pass.
///
/// A failed count is logged and progress is skipped; the load itself still
/// runs.
pub fn load_capture_with_progress<F>(path: &Path, progress: F) -> Result<LoadedCapture, IngestError>
where
    F: FnMut(u64, u64),
{
    let total = match count_packets(path) {
        Ok(total) => total,
        Err(err @ IngestError::NotFound(_)) => return Err(err),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "could not count packets");
            0
        }
    };
    load_counted(path, total, progress)
}

fn load_counted<F>(path: &Path, total: u64, progress: F) -> Result<LoadedCapture, IngestError>
where
    F: FnMut(u64, u64),
{
    let file_size = file_len(path)?;
    let started = Instant::now();

    let mut source = PcapFileSource::open(path).map_err(|source| source_error(path, source))?;
    let capture = read_capture_with_progress(&mut source, total, progress)
        .map_err(|source| source_error(path, source))?;
    let metadata = CaptureMetadata::from_capture(display_name(path), file_size, &capture);

    info!(
        path = %path.display(),
        packets = capture.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "capture loaded"
    );
    Ok(LoadedCapture { capture, metadata })
}

/// Count the packets of a capture file without decoding them.
pub fn count_packets(path: &Path) -> Result<u64, IngestError> {
    file_len(path)?;
    let mut source = PcapFileSource::open(path).map_err(|source| source_error(path, source))?;
    let mut count = 0;
    while source
        .next_packet()
        .map_err(|source| source_error(path, source))?
        .is_some()
    {
        count += 1;
    }
    Ok(count)
}

/// Cheap pre-check: known extension, large enough for a header, and a
/// pcap or pcapng magic number.
pub fn is_valid_capture_file(path: &Path) -> bool {
    let has_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            CAPTURE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        });
    if !has_extension {
        return false;
    }
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() >= MIN_CAPTURE_FILE_LEN => {}
        _ => return false,
    }
    let mut magic = [0u8; 4];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut magic))
        .is_ok_and(|()| is_capture_magic(&magic))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    path: PathBuf,
    modified: Option<SystemTime>,
    len: u64,
}

/// Loads captures and keeps parsed results keyed by file identity.
///
/// A file is re-parsed when its modification time or size changes; the
/// stale entry for the same path is dropped at that point. Shareable across
/// threads.
#[derive(Debug, Default)]
pub struct CaptureLoader {
    cache: Mutex<HashMap<CacheKey, Arc<LoadedCapture>>>,
}

impl CaptureLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, path: &Path) -> Result<Arc<LoadedCapture>, IngestError> {
        self.load_cached(path, load_capture)
    }

    /// Like [`load`](Self::load), reporting decode progress on a cache miss.
    /// Cache hits return without calling `progress`.
    pub fn load_with_progress<F>(
        &self,
        path: &Path,
        progress: F,
    ) -> Result<Arc<LoadedCapture>, IngestError>
    where
        F: FnMut(u64, u64),
    {
        self.load_cached(path, |path| load_capture_with_progress(path, progress))
    }

    fn load_cached<L>(&self, path: &Path, load: L) -> Result<Arc<LoadedCapture>, IngestError>
    where
        L: FnOnce(&Path) -> Result<LoadedCapture, IngestError>,
    {
        let key = cache_key(path)?;
        if let Some(hit) = self.entries().get(&key) {
            debug!(path = %key.path.display(), "capture cache hit");
            return Ok(Arc::clone(hit));
        }

        // Parse outside the lock; a concurrent load of the same file only
        // costs a duplicate parse.
        let loaded = Arc::new(load(path)?);
        let mut entries = self.entries();
        entries.retain(|cached, _| cached.path != key.path);
        entries.insert(key, Arc::clone(&loaded));
        Ok(loaded)
    }

    pub fn clear_cache(&self) {
        self.entries().clear();
        info!("capture cache cleared");
    }

    /// Cached files and their packet counts, sorted by path.
    pub fn cache_info(&self) -> Vec<(PathBuf, usize)> {
        let mut info: Vec<_> = self
            .entries()
            .iter()
            .map(|(key, loaded)| (key.path.clone(), loaded.capture.len()))
            .collect();
        info.sort();
        info
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Arc<LoadedCapture>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn cache_key(path: &Path) -> Result<CacheKey, IngestError> {
    let canonical = fs::canonicalize(path).map_err(|err| io_error(path, err))?;
    let meta = fs::metadata(&canonical).map_err(|err| io_error(path, err))?;
    Ok(CacheKey {
        path: canonical,
        modified: meta.modified().ok(),
        len: meta.len(),
    })
}

fn file_len(path: &Path) -> Result<u64, IngestError> {
    fs::metadata(path)
        .map(|meta| meta.len())
        .map_err(|err| io_error(path, err))
}

fn io_error(path: &Path, err: std::io::Error) -> IngestError {
    if err.kind() == std::io::ErrorKind::NotFound {
        IngestError::NotFound(path.to_path_buf())
    } else {
        IngestError::Io {
            path: path.to_path_buf(),
            source: err,
        }
    }
}

fn source_error(path: &Path, source: SourceError) -> IngestError {
    IngestError::Source {
        path: path.to_path_buf(),
        source,
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::{CaptureLoader, IngestError, is_valid_capture_file, load_capture};
    use std::fs;

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_capture(&dir.path().join("absent.pcap")).unwrap_err();
        assert!(matches!(err, IngestError::NotFound(_)));

        let loader = CaptureLoader::new();
        let err = loader.load(&dir.path().join("absent.pcap")).unwrap_err();
        assert!(matches!(err, IngestError::NotFound(_)));
    }

    #[test]
    fn garbage_file_is_a_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.pcap");
        fs::write(&path, [0x42u8; 64]).unwrap();
        let err = load_capture(&path).unwrap_err();
        assert!(matches!(err, IngestError::Source { .. }));
        assert!(!is_valid_capture_file(&path));
    }

    #[test]
    fn validity_checks_extension_size_and_magic() {
        let dir = tempfile::tempdir().unwrap();
        let mut header = vec![0xd4, 0xc3, 0xb2, 0xa1];
        header.resize(24, 0);

        let good = dir.path().join("trace.PCAP");
        fs::write(&good, &header).unwrap();
        assert!(is_valid_capture_file(&good));

        let wrong_ext = dir.path().join("trace.txt");
        fs::write(&wrong_ext, &header).unwrap();
        assert!(!is_valid_capture_file(&wrong_ext));

        let short = dir.path().join("short.pcapng");
        fs::write(&short, [0x0a, 0x0d, 0x0d, 0x0a]).unwrap();
        assert!(!is_valid_capture_file(&short));

        assert!(!is_valid_capture_file(&dir.path().join("missing.cap")));
    }
}
