//! Test doubles shared by the unit tests

use crate::error::{IoResultExt, Result, TransferError};
use crate::progress::{TransferEvent, TransferObserver};
use crate::remote::{ChunkControl, ChunkHook, DirEntry, FileStat, RemoteAccess};
use crate::transfer::CancellationToken;
use crossbeam::channel::Receiver;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MockState {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    fail_on: BTreeSet<PathBuf>,
}

impl MockState {
    fn parent_exists(&self, path: &Path) -> bool {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => self.dirs.contains(parent),
            _ => true,
        }
    }

    fn has_children(&self, dir: &Path) -> bool {
        self.files.keys().any(|p| p.parent() == Some(dir))
            || self.dirs.iter().any(|p| p.parent() == Some(dir))
    }
}

/// In-memory [`RemoteAccess`] with knobs for failure injection
pub(crate) struct MockRemote {
    state: Mutex<MockState>,
    connected: AtomicBool,
    chunk_size: usize,
    reject_progress: AtomicBool,
    gate: Mutex<Option<Receiver<()>>>,
    puts: AtomicUsize,
    gets: AtomicUsize,
}

impl MockRemote {
    pub(crate) fn new(chunk_size: usize) -> Self {
        let mut state = MockState::default();
        state.dirs.insert(PathBuf::from("/"));
        Self {
            state: Mutex::new(state),
            connected: AtomicBool::new(true),
            chunk_size,
            reject_progress: AtomicBool::new(false),
            gate: Mutex::new(None),
            puts: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
        }
    }

    pub(crate) fn add_dir(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut state = self.lock();
        for ancestor in path.ancestors() {
            if !ancestor.as_os_str().is_empty() {
                state.dirs.insert(ancestor.to_path_buf());
            }
        }
    }

    pub(crate) fn add_file(&self, path: impl Into<PathBuf>, data: Vec<u8>) {
        let path = path.into();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.lock().files.insert(path, data);
    }

    pub(crate) fn file(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.lock().files.get(path.as_ref()).cloned()
    }

    pub(crate) fn has_dir(&self, path: impl AsRef<Path>) -> bool {
        self.lock().dirs.contains(path.as_ref())
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make `put`/`get` reject any progress hook
    pub(crate) fn set_reject_progress(&self, reject: bool) {
        self.reject_progress.store(reject, Ordering::SeqCst);
    }

    /// Block before every chunk until a token arrives (or the sender drops)
    pub(crate) fn set_gate(&self, gate: Receiver<()>) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    /// Fail any `put`/`get` touching this remote path
    pub(crate) fn fail_on(&self, path: impl Into<PathBuf>) {
        self.lock().fail_on.insert(path.into());
    }

    pub(crate) fn put_calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub(crate) fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn wait_gate(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
    }

    fn check_session(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(TransferError::ConnectionUnavailable)
        }
    }

    fn check_call(&self, remote: &Path, hook: &Option<&mut ChunkHook<'_>>) -> Result<()> {
        self.check_session()?;
        if hook.is_some() && self.reject_progress.load(Ordering::SeqCst) {
            return Err(TransferError::ProgressUnsupported(remote.to_path_buf()));
        }
        if self.lock().fail_on.contains(remote) {
            return Err(TransferError::remote(remote, "injected failure"));
        }
        Ok(())
    }
}

impl RemoteAccess for MockRemote {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn stat(&self, path: &Path) -> Result<FileStat> {
        self.check_session()?;
        let state = self.lock();
        if let Some(data) = state.files.get(path) {
            Ok(FileStat {
                size: data.len() as u64,
                is_dir: false,
                mtime: 0,
            })
        } else if state.dirs.contains(path) {
            Ok(FileStat {
                size: 0,
                is_dir: true,
                mtime: 0,
            })
        } else {
            Err(TransferError::NotFound(path.to_path_buf()))
        }
    }

    fn list(&self, path: &Path) -> Result<Vec<DirEntry>> {
        self.check_session()?;
        let state = self.lock();
        if !state.dirs.contains(path) {
            return Err(TransferError::NotFound(path.to_path_buf()));
        }

        let name = |p: &Path| p.file_name().map(|n| n.to_string_lossy().into_owned());
        let mut entries = Vec::new();
        for (file, data) in &state.files {
            if file.parent() == Some(path) {
                if let Some(name) = name(file) {
                    entries.push(DirEntry {
                        name,
                        size: data.len() as u64,
                        is_dir: false,
                        mtime: 0,
                    });
                }
            }
        }
        for dir in &state.dirs {
            if dir.parent() == Some(path) {
                if let Some(name) = name(dir) {
                    entries.push(DirEntry {
                        name,
                        size: 0,
                        is_dir: true,
                        mtime: 0,
                    });
                }
            }
        }
        // Reverse so callers cannot rely on listing order
        entries.reverse();
        Ok(entries)
    }

    fn put(
        &self,
        local: &Path,
        remote: &Path,
        mut on_chunk: Option<&mut ChunkHook<'_>>,
    ) -> Result<u64> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.check_call(remote, &on_chunk)?;
        let data = std::fs::read(local).with_path(local)?;

        {
            let mut state = self.lock();
            if !state.parent_exists(remote) {
                return Err(TransferError::NotFound(remote.to_path_buf()));
            }
            state.files.insert(remote.to_path_buf(), Vec::new());
        }

        let mut written = 0u64;
        for chunk in data.chunks(self.chunk_size.max(1)) {
            self.wait_gate();
            if let Some(file) = self.lock().files.get_mut(remote) {
                file.extend_from_slice(chunk);
            }
            written += chunk.len() as u64;
            if let Some(hook) = on_chunk.as_deref_mut() {
                if hook(written) == ChunkControl::Abort {
                    return Err(TransferError::Cancelled);
                }
            }
        }
        Ok(written)
    }

    fn get(
        &self,
        remote: &Path,
        local: &Path,
        mut on_chunk: Option<&mut ChunkHook<'_>>,
    ) -> Result<u64> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check_call(remote, &on_chunk)?;
        let data = self
            .lock()
            .files
            .get(remote)
            .cloned()
            .ok_or_else(|| TransferError::NotFound(remote.to_path_buf()))?;

        let mut file = std::fs::File::create(local).with_path(local)?;
        let mut written = 0u64;
        for chunk in data.chunks(self.chunk_size.max(1)) {
            self.wait_gate();
            file.write_all(chunk).with_path(local)?;
            written += chunk.len() as u64;
            if let Some(hook) = on_chunk.as_deref_mut() {
                if hook(written) == ChunkControl::Abort {
                    return Err(TransferError::Cancelled);
                }
            }
        }
        Ok(written)
    }

    fn mkdir(&self, path: &Path) -> Result<()> {
        self.check_session()?;
        let mut state = self.lock();
        if state.dirs.contains(path) || state.files.contains_key(path) {
            return Err(TransferError::AlreadyExists(path.to_path_buf()));
        }
        if !state.parent_exists(path) {
            return Err(TransferError::NotFound(path.to_path_buf()));
        }
        state.dirs.insert(path.to_path_buf());
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.check_session()?;
        self.lock()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| TransferError::NotFound(path.to_path_buf()))
    }

    fn rmdir(&self, path: &Path) -> Result<()> {
        self.check_session()?;
        let mut state = self.lock();
        if !state.dirs.contains(path) {
            return Err(TransferError::NotFound(path.to_path_buf()));
        }
        if state.has_children(path) {
            return Err(TransferError::remote(path, "directory not empty"));
        }
        state.dirs.remove(path);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.check_session()?;
        let mut state = self.lock();
        if let Some(data) = state.files.remove(from) {
            state.files.insert(to.to_path_buf(), data);
            return Ok(());
        }
        if !state.dirs.contains(from) {
            return Err(TransferError::NotFound(from.to_path_buf()));
        }

        let moved = |p: &Path| p.strip_prefix(from).ok().map(|rest| to.join(rest));
        state.dirs = state
            .dirs
            .iter()
            .map(|d| moved(d).unwrap_or_else(|| d.clone()))
            .collect();
        state.files = std::mem::take(&mut state.files)
            .into_iter()
            .map(|(p, data)| (moved(&p).unwrap_or(p), data))
            .collect();
        Ok(())
    }
}

/// Observer that records every event and can request cancellation once
/// per-file progress reaches a threshold
#[derive(Default)]
pub(crate) struct RecordingObserver {
    events: Mutex<Vec<TransferEvent>>,
    cancel_at: Option<(f64, CancellationToken)>,
}

impl RecordingObserver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn cancelling_at(percent: f64, token: CancellationToken) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            cancel_at: Some((percent, token)),
        }
    }

    pub(crate) fn events(&self) -> Vec<TransferEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn progress(&self) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TransferEvent::Progress(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn statuses(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TransferEvent::Status(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn batch_progress(&self) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TransferEvent::BatchProgress(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: TransferEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl TransferObserver for RecordingObserver {
    fn on_progress(&self, percent: f64) {
        self.record(TransferEvent::Progress(percent));
        if let Some((threshold, token)) = &self.cancel_at {
            if percent >= *threshold {
                token.cancel();
            }
        }
    }

    fn on_status(&self, message: &str) {
        self.record(TransferEvent::Status(message.to_string()));
    }

    fn on_speed(&self, speed: &str) {
        self.record(TransferEvent::Speed(speed.to_string()));
    }

    fn on_eta(&self, eta: &str) {
        self.record(TransferEvent::Eta(eta.to_string()));
    }

    fn on_batch_progress(&self, percent: f64) {
        self.record(TransferEvent::BatchProgress(percent));
    }
}
