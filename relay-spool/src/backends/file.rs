use std::{
    path::{Component, Path, PathBuf},
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use relay_common::{Mail, internal};
use serde::Deserialize;
use tokio::{fs, io::AsyncWriteExt};

use crate::{
    SerializationError, SpoolError, ValidationError,
    store::BackingStore,
    types::{ENTRY_EXTENSION, QueueEntryId},
};

const TEMP_PREFIX: &str = ".tmp_";
const DELETED_SUFFIX: &str = ".deleted";

/// A `.tmp_` file younger than this may still be written by another process
/// sharing the queue, so [`FileBackingStore::init`] leaves it alone.
pub const TEMP_ORPHAN_AGE: Duration = Duration::from_secs(60 * 60);

/// File-based backing store
///
/// Every entry is a single bincode-encoded [`Mail`] named `<ulid>.msg`.
///
/// # Atomicity
/// Entries are created exclusively under a `.tmp_` name, fully written and
/// synced, then renamed into place. Listing skips anything that is not a
/// finished entry, so a partially written file is never observed.
///
/// Removal renames the entry to `<ulid>.msg.deleted` before unlinking it.
/// [`Self::init`] sweeps `.deleted` leftovers, and `.tmp_` leftovers once they
/// are older than [`TEMP_ORPHAN_AGE`]. Several processes may open the same
/// queue at once.
#[derive(Debug, Clone)]
pub struct FileBackingStore {
    path: PathBuf,
}

impl Default for FileBackingStore {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/spool/relay"),
        }
    }
}

impl<'de> Deserialize<'de> for FileBackingStore {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct FileBackingStoreHelper {
            path: PathBuf,
        }

        let helper = FileBackingStoreHelper::deserialize(deserializer)?;
        Self::validate_path(&helper.path).map_err(serde::de::Error::custom)?;

        Ok(Self { path: helper.path })
    }
}

impl FileBackingStore {
    /// Reject queue paths that are relative, contain `..` or point into a
    /// system directory
    fn validate_path(path: &Path) -> Result<(), ValidationError> {
        const SENSITIVE_PREFIXES: [&str; 9] = [
            "/etc", "/bin", "/sbin", "/usr/bin", "/usr/sbin", "/boot", "/sys", "/proc", "/dev",
        ];

        if path.components().any(|c| c == Component::ParentDir) {
            return Err(ValidationError::ParentDir(path.display().to_string()));
        }

        if !path.is_absolute() {
            return Err(ValidationError::NotAbsolute(path.display().to_string()));
        }

        if let Some(prefix) = SENSITIVE_PREFIXES
            .into_iter()
            .find(|prefix| path.starts_with(prefix))
        {
            return Err(ValidationError::SystemDirectory {
                prefix,
                path: path.display().to_string(),
            });
        }

        Ok(())
    }

    #[must_use]
    pub fn builder() -> FileBackingStoreBuilder {
        FileBackingStoreBuilder::default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Prepare the queue directory
    ///
    /// Creates the directory if it is missing and removes orphaned temporary
    /// and `.deleted` files left behind by a crash.
    ///
    /// # Errors
    /// If the directory cannot be created, is not a directory, or cannot be
    /// scanned
    pub fn init(&self) -> crate::Result<()> {
        internal!("Initialising queue at {} ...", self.path.display());

        if !self.path.try_exists()? {
            internal!("{} does not exist, creating...", self.path.display());
            std::fs::create_dir_all(&self.path)?;
        } else if !self.path.is_dir() {
            return Err(ValidationError::NotDirectory(self.path.display().to_string()).into());
        }

        self.cleanup_orphans()
    }

    fn cleanup_orphans(&self) -> crate::Result<()> {
        let mut cleaned = 0;

        for entry in std::fs::read_dir(&self.path)? {
            let entry = entry?;
            let filename = entry.file_name();
            let filename = filename.to_string_lossy();

            let orphaned = if filename.ends_with(DELETED_SUFFIX) {
                true
            } else if filename.starts_with(TEMP_PREFIX) {
                Self::is_stale(&entry)
            } else {
                false
            };

            if orphaned {
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => cleaned += 1,
                    // Finished or removed by its owner in the meantime
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }

        if cleaned > 0 {
            internal!(
                level = INFO,
                "Cleaned up {cleaned} orphaned files from the queue"
            );
        }

        Ok(())
    }

    fn is_stale(entry: &std::fs::DirEntry) -> bool {
        entry
            .metadata()
            .and_then(|metadata| metadata.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age >= TEMP_ORPHAN_AGE)
    }

    fn entry_path(&self, id: &QueueEntryId) -> PathBuf {
        self.path.join(id.filename())
    }

    fn not_found(err: std::io::Error, id: &QueueEntryId) -> SpoolError {
        if err.kind() == std::io::ErrorKind::NotFound {
            SpoolError::NotFound(id.clone())
        } else {
            SpoolError::Io(err)
        }
    }
}

#[async_trait]
impl BackingStore for FileBackingStore {
    async fn enqueue(&self, mail: &Mail) -> crate::Result<QueueEntryId> {
        let id = QueueEntryId::generate();
        let filename = id.filename();

        let bytes = bincode::serde::encode_to_vec(mail, bincode::config::standard())
            .map_err(SerializationError::from)?;

        let temp_path = self.path.join(format!("{TEMP_PREFIX}{filename}"));
        let final_path = self.path.join(&filename);

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;

        let written = async {
            file.write_all(&bytes).await?;
            file.sync_all().await
        }
        .await;
        drop(file);

        if let Err(err) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err.into());
        }

        fs::rename(&temp_path, &final_path).await?;

        internal!(
            level = DEBUG,
            "Queued entry {id} at {}",
            final_path.display()
        );

        Ok(id)
    }

    async fn list(&self) -> crate::Result<Vec<QueueEntryId>> {
        let mut entries = fs::read_dir(&self.path).await?;
        let mut ids = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let filename = entry.file_name();
            let filename = filename.to_string_lossy();

            if filename.ends_with(ENTRY_EXTENSION)
                && !filename.starts_with(TEMP_PREFIX)
                && let Some(id) = QueueEntryId::from_filename(&filename)
            {
                ids.push(id);
            }
        }

        ids.sort();

        internal!(level = DEBUG, "Found {} entries in queue", ids.len());

        Ok(ids)
    }

    async fn load(&self, id: &QueueEntryId) -> crate::Result<Mail> {
        let bytes = fs::read(self.entry_path(id))
            .await
            .map_err(|err| Self::not_found(err, id))?;

        let (mail, read): (Mail, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(SerializationError::from)?;

        if read != bytes.len() {
            return Err(SerializationError::TrailingBytes(bytes.len() - read).into());
        }

        Ok(mail)
    }

    async fn remove(&self, id: &QueueEntryId) -> crate::Result<()> {
        let path = self.entry_path(id);
        let deleted = self.path.join(format!("{}{DELETED_SUFFIX}", id.filename()));

        fs::rename(&path, &deleted)
            .await
            .map_err(|err| Self::not_found(err, id))?;
        match fs::remove_file(&deleted).await {
            Ok(()) => {}
            // Swept by another store's init
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        internal!(level = DEBUG, "Removed entry {id} from queue");

        Ok(())
    }
}

/// Builder for [`FileBackingStore`]
#[derive(Debug, Default)]
pub struct FileBackingStoreBuilder {
    path: PathBuf,
}

impl FileBackingStoreBuilder {
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// # Errors
    /// If the path is relative, contains `..` or points at a system directory
    pub fn build(self) -> crate::Result<FileBackingStore> {
        FileBackingStore::validate_path(&self.path)?;
        Ok(FileBackingStore { path: self.path })
    }
}
