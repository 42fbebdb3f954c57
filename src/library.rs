//! Picture library catalog: directory walk, classification, and the flat
//! slide sequence with its wrapping cursor.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use rand::seq::SliceRandom;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::Error;
use crate::rules::{PathRules, PathStatus};

/// One qualifying image file: the relative name of its directory plus the
/// bare file name. Cheap to clone; the strings are shared with the owning
/// [`PicDir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub dir: Arc<str>,
    pub file: Arc<str>,
}

impl Entry {
    /// Absolute path of the image under `root`.
    pub fn path(&self, root: &Path) -> PathBuf {
        if self.dir.is_empty() {
            root.join(&*self.file)
        } else {
            root.join(&*self.dir).join(&*self.file)
        }
    }
}

/// A directory that contributed at least one entry to the catalog.
#[derive(Debug, Clone)]
pub struct PicDir {
    pub rel_name: Arc<str>,
    pub files: Vec<Arc<str>>,
}

impl PicDir {
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

/// The complete result of one scan: directories in traversal order and the
/// flat entry sequence (optionally a shuffled permutation of the
/// concatenated per-directory lists). Immutable once built apart from the
/// cursor; a rescan replaces the whole catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    dirs: Vec<PicDir>,
    flat: Vec<Entry>,
    cursor: usize,
}

impl Catalog {
    pub fn entry_count(&self) -> usize {
        self.flat.len()
    }

    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }

    pub fn dirs(&self) -> &[PicDir] {
        &self.dirs
    }

    pub fn flat(&self) -> &[Entry] {
        &self.flat
    }

    pub fn entry_at(&self, index: usize) -> Option<&Entry> {
        self.flat.get(index)
    }

    /// Return the entry at the cursor and move the cursor forward, wrapping
    /// at the end. A no-op returning `None` on an empty catalog.
    pub fn advance(&mut self) -> Option<Entry> {
        let entry = self.flat.get(self.cursor)?.clone();
        self.cursor = (self.cursor + 1) % self.flat.len();
        Some(entry)
    }

    /// Log the catalog structure, navigated by directory.
    pub fn dump(&self) {
        debug!(directories = self.dirs.len(), "catalog dump");
        for dir in &self.dirs {
            debug!(dir = %dir.rel_name, files = dir.file_count());
            for file in &dir.files {
                debug!(file = %file);
            }
        }
    }
}

struct ScanShared {
    scanning: AtomicBool,
    progress: Mutex<Option<Entry>>,
    outcome: Mutex<Option<Result<Catalog, Error>>>,
}

/// A picture library rooted at one directory, scanned asynchronously.
///
/// Only one scan may be in flight at a time; [`Library::start_scan`] refuses
/// to start a second. Callers poll [`Library::is_scanning`] and
/// [`Library::current_entry`] for live progress, then collect the result via
/// [`Library::take_catalog`].
pub struct Library {
    root: PathBuf,
    rules: Arc<PathRules>,
    shared: Arc<ScanShared>,
}

impl Library {
    pub fn new(root: PathBuf, rules: PathRules) -> Self {
        Self {
            root,
            rules: Arc::new(rules),
            shared: Arc::new(ScanShared {
                scanning: AtomicBool::new(false),
                progress: Mutex::new(None),
                outcome: Mutex::new(None),
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Begin an asynchronous scan on a dedicated thread. There is no
    /// cancellation; the scan runs to completion.
    pub fn start_scan(&self, shuffle: bool) -> Result<JoinHandle<()>, Error> {
        if self
            .shared
            .scanning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::ScanInProgress);
        }
        *self.shared.progress.lock().expect("scan state poisoned") = None;

        let root = self.root.clone();
        let rules = Arc::clone(&self.rules);
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("library-scan".into())
            .spawn(move || {
                let result = scan_tree(&root, &rules, shuffle, &shared.progress);
                *shared.outcome.lock().expect("scan state poisoned") = Some(result);
                shared.scanning.store(false, Ordering::Release);
            })
            .map_err(|source| {
                self.shared.scanning.store(false, Ordering::Release);
                Error::Io(source)
            })?;
        Ok(handle)
    }

    /// Run a scan on the calling thread.
    pub fn scan_blocking(&self, shuffle: bool) -> Result<Catalog, Error> {
        scan_tree(&self.root, &self.rules, shuffle, &self.shared.progress)
    }

    pub fn is_scanning(&self) -> bool {
        self.shared.scanning.load(Ordering::Acquire)
    }

    /// The most recently classified include-entry, for progress reporting.
    pub fn current_entry(&self) -> Option<Entry> {
        self.shared
            .progress
            .lock()
            .expect("scan state poisoned")
            .clone()
    }

    /// Collect the finished scan result, if one is waiting.
    pub fn take_catalog(&self) -> Option<Result<Catalog, Error>> {
        self.shared
            .outcome
            .lock()
            .expect("scan state poisoned")
            .take()
    }
}

fn scan_tree(
    root: &Path,
    rules: &PathRules,
    shuffle: bool,
    progress: &Mutex<Option<Entry>>,
) -> Result<Catalog, Error> {
    info!(root = %root.display(), "directory scan");

    // A bad root aborts the scan with an empty result; anything below it is
    // handled per subtree.
    fs::read_dir(root).map_err(|source| Error::ScanRoot {
        path: root.to_path_buf(),
        source,
    })?;

    let mut by_dir: BTreeMap<String, Vec<Arc<str>>> = BTreeMap::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| keep_dir(e, root, rules));
    for item in walker {
        let entry = match item {
            Ok(entry) => entry,
            Err(err) => {
                if err.depth() == 0 {
                    return Err(Error::ScanRoot {
                        path: root.to_path_buf(),
                        source: err
                            .into_io_error()
                            .unwrap_or_else(|| std::io::Error::other("walk failed")),
                    });
                }
                warn!(error = %err, "skipping unreadable subtree");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            debug!(path = %entry.path().display(), "skipping non-utf8 file name");
            continue;
        };
        if rules.files.classify(name) != PathStatus::Include {
            continue;
        }
        let rel_dir = relative_dir(entry.path(), root);
        let file: Arc<str> = Arc::from(name);
        *progress.lock().expect("scan state poisoned") = Some(Entry {
            dir: Arc::from(rel_dir.as_str()),
            file: file.clone(),
        });
        by_dir.entry(rel_dir).or_default().push(file);
    }

    let mut dirs = Vec::with_capacity(by_dir.len());
    let mut flat = Vec::new();
    for (rel, files) in by_dir {
        let rel_name: Arc<str> = Arc::from(rel.as_str());
        for file in &files {
            flat.push(Entry {
                dir: rel_name.clone(),
                file: file.clone(),
            });
        }
        dirs.push(PicDir { rel_name, files });
    }
    if shuffle {
        flat.shuffle(&mut rand::rng());
    }
    info!(
        directories = dirs.len(),
        entries = flat.len(),
        shuffle,
        "library scan complete"
    );
    Ok(Catalog {
        dirs,
        flat,
        cursor: 0,
    })
}

fn keep_dir(entry: &DirEntry, root: &Path, rules: &PathRules) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    let rel = entry
        .path()
        .strip_prefix(root)
        .unwrap_or(entry.path())
        .to_string_lossy()
        .into_owned();
    // Skip and Exclude both prune the subtree from traversal.
    rules.dirs.classify(&rel) == PathStatus::Include
}

fn relative_dir(file_path: &Path, root: &Path) -> String {
    file_path
        .parent()
        .and_then(|parent| parent.strip_prefix(root).ok())
        .map(|rel| rel.to_string_lossy().into_owned())
        .unwrap_or_default()
}
