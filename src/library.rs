//! The on-disk photo library and its persisted "current photo" pointer.
//!
//! The directory is the only source of truth: order is re-derived from file
//! modification times on every call and nothing is cached between calls.
//! Hidden entries (leading `.`) are never photos, which is how in-flight
//! writes and the default pointer file stay out of listings.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, IoContext, Result};

/// Extensions that count as photos inside the library (lowercase, without dot).
pub const LIBRARY_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Return `true` if `path` names a visible file with a library extension.
#[must_use]
pub fn is_library_image(path: &Path) -> bool {
    let visible = path
        .file_name()
        .and_then(OsStr::to_str)
        .is_some_and(|n| !n.starts_with('.'));
    visible
        && path
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| {
                let ext = ext.to_ascii_lowercase();
                LIBRARY_EXTENSIONS.contains(&ext.as_str())
            })
}

/// A normalized image living in the library directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    /// File name only; this is what the pointer stores.
    pub name: String,
    pub path: PathBuf,
    /// Sole ordering key.
    pub modified: SystemTime,
}

impl Photo {
    pub fn from_path(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path).at(path)?;
        let modified = meta.modified().at(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Precondition(format!("{} has no file name", path.display())))?;
        Ok(Self {
            name,
            path: path.to_path_buf(),
            modified,
        })
    }
}

/// Outcome of a retention pass. Deletion is attempted for every candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub kept: usize,
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
    /// The current photo, when it would have been evicted but was spared.
    pub spared: Option<PathBuf>,
}

impl RetentionReport {
    pub fn all_deleted(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct LibraryStore {
    dir: PathBuf,
    pointer_file: PathBuf,
    placeholder: Option<PathBuf>,
}

impl LibraryStore {
    pub fn new(dir: impl Into<PathBuf>, pointer_file: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pointer_file: pointer_file.into(),
            placeholder: None,
        }
    }

    /// Like [`LibraryStore::new`], creating the library directory if needed.
    pub fn open(dir: impl Into<PathBuf>, pointer_file: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(dir, pointer_file);
        fs::create_dir_all(&store.dir).at(&store.dir)?;
        Ok(store)
    }

    /// Image seeded into an empty library by [`LibraryStore::advance`].
    pub fn with_placeholder(mut self, placeholder: Option<PathBuf>) -> Self {
        self.placeholder = placeholder;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn pointer_file(&self) -> &Path {
        &self.pointer_file
    }

    /// All photos, oldest first. Ties on mtime fall back to the file name.
    pub fn list_ordered(&self) -> Result<Vec<Photo>> {
        let mut photos = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    let source = err
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::other("cannot list library"));
                    return Err(Error::fs(&self.dir, source));
                }
                Err(err) => {
                    debug!("skipping unreadable library entry: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_library_image(entry.path()) {
                continue;
            }
            match Photo::from_path(entry.path()) {
                Ok(photo) => photos.push(photo),
                // Deleted between listing and stat.
                Err(err) => debug!(path = %entry.path().display(), "skipping: {err}"),
            }
        }
        photos.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)));
        Ok(photos)
    }

    /// Raw pointer contents: the current photo's file name, if any.
    pub fn pointer(&self) -> Option<String> {
        let raw = match fs::read_to_string(&self.pointer_file) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(path = %self.pointer_file.display(), "no current pointer: {err}");
                return None;
            }
        };
        let name = Path::new(raw.trim())
            .file_name()?
            .to_string_lossy()
            .into_owned();
        (!name.is_empty()).then_some(name)
    }

    /// The photo the pointer names, resolved now. `None` when the pointer is
    /// absent or unreadable, or the file it names is gone.
    pub fn current(&self) -> Option<Photo> {
        let name = self.pointer()?;
        let path = self.dir.join(&name);
        if !is_library_image(&path) {
            return None;
        }
        Photo::from_path(&path).ok()
    }

    /// The photo after the current one, cyclically.
    ///
    /// A missing or dangling pointer restarts at the oldest photo. An empty
    /// library is seeded with the placeholder.
    ///
    /// # Errors
    /// [`Error::EmptyLibrary`] when there is nothing to show and no placeholder.
    pub fn advance(&self) -> Result<Photo> {
        let mut photos = self.list_ordered()?;
        if photos.is_empty() {
            return self.seed_placeholder();
        }
        let next = match self.pointer() {
            Some(name) => match photos.iter().position(|p| p.name == name) {
                Some(idx) => (idx + 1) % photos.len(),
                None => {
                    debug!(pointer = %name, "current photo not in library; restarting rotation");
                    0
                }
            },
            None => 0,
        };
        Ok(photos.swap_remove(next))
    }

    /// Persist `photo` as current (overwrite, via a hidden temp file + rename).
    pub fn set_current(&self, photo: &Photo) -> Result<()> {
        if let Some(parent) = self.pointer_file.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).at(parent)?;
        }
        write_then_rename(&self.pointer_file, |tmp| {
            fs::write(tmp, photo.name.as_bytes()).at(tmp)
        })?;
        debug!(photo = %photo.name, "current pointer updated");
        Ok(())
    }

    /// Remove the file the pointer names. The pointer itself is left as is.
    pub fn delete_current(&self) -> bool {
        let Some(name) = self.pointer() else {
            info!("no current photo to delete");
            return false;
        };
        let path = self.dir.join(&name);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "deleted current photo");
                true
            }
            Err(err) => {
                warn!(path = %path.display(), "failed to delete current photo: {err}");
                false
            }
        }
    }

    /// Delete all but the `max_count` most recently modified photos.
    ///
    /// The current photo is never deleted; if it falls outside the kept set it
    /// is spared in addition. A failed delete is logged and the pass goes on.
    pub fn enforce_retention(&self, max_count: usize) -> Result<RetentionReport> {
        if max_count == 0 {
            return Err(Error::Precondition("retention count must be positive".into()));
        }
        let photos = self.list_ordered()?;
        let evict = photos.len().saturating_sub(max_count);
        let current = self.pointer();

        let mut report = RetentionReport::default();
        for photo in &photos[..evict] {
            if current.as_deref() == Some(photo.name.as_str()) {
                debug!(path = %photo.path.display(), "retention: sparing current photo");
                report.spared = Some(photo.path.clone());
                continue;
            }
            match fs::remove_file(&photo.path) {
                Ok(()) => {
                    info!(path = %photo.path.display(), "retention: removed");
                    report.deleted.push(photo.path.clone());
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    debug!(path = %photo.path.display(), "retention: vanished during remove");
                    report.deleted.push(photo.path.clone());
                }
                Err(err) => {
                    error!(path = %photo.path.display(), "retention: delete failed: {err}");
                    report.failed.push(photo.path.clone());
                }
            }
        }
        report.kept = photos.len() - report.deleted.len();
        info!(
            total = photos.len(),
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            keep = max_count,
            "retention pass complete"
        );
        Ok(report)
    }

    fn seed_placeholder(&self) -> Result<Photo> {
        let Some(src) = self.placeholder.as_ref().filter(|p| p.is_file()) else {
            error!(library = %self.dir.display(), "no photos and no placeholder available");
            return Err(Error::EmptyLibrary);
        };
        let Some(name) = src.file_name() else {
            return Err(Error::EmptyLibrary);
        };
        let dest = self.dir.join(name);
        if !is_library_image(&dest) {
            error!(placeholder = %src.display(), "placeholder is not a library image");
            return Err(Error::EmptyLibrary);
        }
        write_then_rename(&dest, |tmp| fs::copy(src, tmp).map(|_| ()).at(tmp))?;
        warn!(placeholder = %src.display(), "library empty; seeded placeholder");
        Photo::from_path(&dest)
    }
}

/// Hidden sibling used while `target` is being written.
pub(crate) fn partial_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.partial"))
}

/// Write through `write` into a hidden sibling, then rename it onto `target`.
///
/// A failed write never leaves anything visible under `target`'s name.
pub(crate) fn write_then_rename<F>(target: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let tmp = partial_path(target);
    if let Err(err) = write(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    if let Err(source) = fs::rename(&tmp, target) {
        let _ = fs::remove_file(&tmp);
        return Err(Error::fs(target, source));
    }
    Ok(())
}
