use std::time::SystemTime;

/// One on-disk revision of the spreadsheet: modification time plus content digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFingerprint {
    pub modified: SystemTime,
    pub hash: String,
}

impl FileFingerprint {
    pub fn new(modified: SystemTime, content: &[u8]) -> Self {
        Self {
            modified,
            hash: format!("{:x}", md5::compute(content)),
        }
    }

    /// True when `current` is a newer timestamp or a different content hash.
    pub fn is_superseded_by(&self, current: &FileFingerprint) -> bool {
        current.modified > self.modified || current.hash != self.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn newer_timestamp_or_new_hash_supersedes() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let base = FileFingerprint::new(t0, b"a,b\n1,2\n");

        assert!(!base.is_superseded_by(&FileFingerprint::new(t0, b"a,b\n1,2\n")));
        assert!(base.is_superseded_by(&FileFingerprint::new(
            t0 + Duration::from_secs(1),
            b"a,b\n1,2\n"
        )));
        assert!(base.is_superseded_by(&FileFingerprint::new(
            t0 - Duration::from_secs(1),
            b"a,b\n1,3\n"
        )));
        assert!(!base.is_superseded_by(&FileFingerprint::new(
            t0 - Duration::from_secs(1),
            b"a,b\n1,2\n"
        )));
    }
}
