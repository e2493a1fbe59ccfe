use std::sync::Arc;

use crate::domain::entities::fingerprint::FileFingerprint;
use crate::usecase::ports::events::{EventSink, SyncEvent};
use crate::usecase::ports::source::{SourceError, TabularSource};

/// Tracks the last seen revision of a tabular source.
pub struct ChangeDetector {
    source: Arc<dyn TabularSource>,
    sink: Arc<dyn EventSink>,
    fingerprint: Option<FileFingerprint>,
}

impl ChangeDetector {
    pub fn new(source: Arc<dyn TabularSource>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            source,
            sink,
            fingerprint: None,
        }
    }

    pub fn source(&self) -> &Arc<dyn TabularSource> {
        &self.source
    }

    pub fn fingerprint(&self) -> Option<&FileFingerprint> {
        self.fingerprint.as_ref()
    }

    /// Like [`ChangeDetector::check`], but I/O failures are reported and read as "no change".
    pub fn has_changed(&mut self) -> bool {
        match self.check() {
            Ok(changed) => changed,
            Err(err) => {
                self.sink.emit(&SyncEvent::DetectionFailed {
                    path: self.source.path(),
                    message: &err.to_string(),
                });
                false
            }
        }
    }

    /// Compares the file on disk with the stored fingerprint. The fingerprint
    /// is replaced only when a change is detected.
    pub fn check(&mut self) -> Result<bool, SourceError> {
        match self.pending_change()? {
            Some(current) => {
                self.commit(current);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns the new fingerprint when the file changed, without recording it.
    /// Pass it to [`ChangeDetector::commit`] once the change has been handled.
    pub fn pending_change(&self) -> Result<Option<FileFingerprint>, SourceError> {
        if !self.source.exists() {
            return Ok(None);
        }

        let current = self.current()?;
        let changed = match &self.fingerprint {
            None => true,
            Some(previous) => previous.is_superseded_by(&current),
        };
        if !changed {
            return Ok(None);
        }

        self.sink.emit(&SyncEvent::ChangeDetected {
            path: self.source.path(),
        });
        Ok(Some(current))
    }

    pub fn commit(&mut self, fingerprint: FileFingerprint) {
        self.fingerprint = Some(fingerprint);
    }

    /// Records the current revision unconditionally, e.g. after writing the file ourselves.
    pub fn refresh(&mut self) -> Result<(), SourceError> {
        if !self.source.exists() {
            return Err(SourceError::NotFound(self.source.path().to_path_buf()));
        }
        self.fingerprint = Some(self.current()?);
        Ok(())
    }

    fn current(&self) -> Result<FileFingerprint, SourceError> {
        let modified = self.source.modified()?;
        let content = self.source.content()?;
        Ok(FileFingerprint::new(modified, &content))
    }
}
