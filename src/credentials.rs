use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

const CREDENTIALS_FILE: &str = "credentials.json";

pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl Credentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.access_key_id.is_empty()
            && !self.secret_access_key.is_empty()
            && !self.region.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"********")
            .field("region", &self.region)
            .finish()
    }
}

/// One active login. Every gateway is built from a session and dropped with it.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: Uuid,
    credentials: Credentials,
}

impl Session {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            id: Uuid::new_v4(),
            credentials,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn region(&self) -> &str {
        &self.credentials.region
    }
}

/// Credentials persisted as a single JSON record in the config directory.
pub struct CredentialStore {
    file_path: PathBuf,
    current: Option<Credentials>,
    configured: watch::Sender<bool>,
}

impl CredentialStore {
    pub fn new() -> Result<Self> {
        let config_dir = ProjectDirs::from("com", "ecs-lookout", "ecs-lookout")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Self::in_dir(&config_dir)
    }

    pub fn in_dir(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let (configured, _) = watch::channel(false);
        Ok(Self {
            file_path: dir.join(CREDENTIALS_FILE),
            current: None,
            configured,
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Reads the stored record. A missing, unreadable or malformed file counts
    /// as "no credentials".
    pub fn load(&mut self) -> Option<Credentials> {
        let content = fs::read_to_string(&self.file_path).ok()?;
        let credentials = match serde_json::from_str::<Credentials>(&content) {
            Ok(credentials) if credentials.is_complete() => credentials,
            Ok(_) => {
                warn!(path = %self.file_path.display(), "stored credentials are incomplete");
                return None;
            }
            Err(err) => {
                warn!(path = %self.file_path.display(), %err, "ignoring malformed credentials");
                return None;
            }
        };
        self.current = Some(credentials.clone());
        self.configured.send_replace(true);
        Some(credentials)
    }

    /// Persists and replaces the current record. Incomplete credentials are
    /// ignored and `Ok(false)` is returned.
    pub fn save(&mut self, credentials: Credentials) -> Result<bool> {
        if !credentials.is_complete() {
            return Ok(false);
        }
        let json = serde_json::to_string_pretty(&credentials)?;
        write_private(&self.file_path, json.as_bytes())
            .with_context(|| format!("failed to save credentials to {}", self.file_path.display()))?;
        restrict_permissions(&self.file_path)?;
        info!(region = %credentials.region, "credentials saved");
        self.current = Some(credentials);
        self.configured.send_replace(true);
        Ok(true)
    }

    /// Forgets the in-memory record, then removes the file. The store reads
    /// as unconfigured even when the removal fails.
    pub fn clear(&mut self) -> Result<()> {
        self.current = None;
        self.configured.send_replace(false);
        if self.file_path.exists() {
            fs::remove_file(&self.file_path).with_context(|| {
                format!("failed to remove {}", self.file_path.display())
            })?;
        }
        info!("credentials cleared");
        Ok(())
    }

    pub fn current(&self) -> Option<&Credentials> {
        self.current.as_ref()
    }

    pub fn is_configured(&self) -> bool {
        self.current.is_some()
    }

    /// Observes configured/unconfigured transitions.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.configured.subscribe()
    }
}

/// Writes `contents` to a file that is owner-only from the moment it exists.
fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to restrict permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
pub(crate) fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("ecs-lookout-test-{}", Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Credentials {
        Credentials::new("AKIAEXAMPLE", "secret", "us-east-1")
    }

    #[test]
    fn incomplete_credentials_are_not_persisted() {
        let dir = scratch_dir();
        let mut store = CredentialStore::in_dir(&dir).unwrap();
        for creds in [
            Credentials::new("", "secret", "us-east-1"),
            Credentials::new("AKIA", "", "us-east-1"),
            Credentials::new("AKIA", "secret", ""),
        ] {
            assert!(!store.save(creds).unwrap());
            assert!(!store.is_configured());
            assert!(!store.path().exists());
        }
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn saved_credentials_load_back_unchanged() {
        let dir = scratch_dir();
        let mut store = CredentialStore::in_dir(&dir).unwrap();
        assert!(store.save(sample()).unwrap());

        let mut fresh = CredentialStore::in_dir(&dir).unwrap();
        assert_eq!(fresh.load(), Some(sample()));
        assert!(fresh.is_configured());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn stored_record_uses_camel_case_keys() {
        let dir = scratch_dir();
        let mut store = CredentialStore::in_dir(&dir).unwrap();
        store.save(sample()).unwrap();
        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"accessKeyId\""));
        assert!(raw.contains("\"secretAccessKey\""));
        assert!(raw.contains("\"region\""));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn malformed_file_is_treated_as_absent() {
        let dir = scratch_dir();
        let mut store = CredentialStore::in_dir(&dir).unwrap();
        fs::write(store.path(), "{ not json").unwrap();
        assert_eq!(store.load(), None);
        assert!(!store.is_configured());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn missing_file_is_treated_as_absent() {
        let dir = scratch_dir();
        let mut store = CredentialStore::in_dir(&dir).unwrap();
        assert_eq!(store.load(), None);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn clear_removes_the_stored_record() {
        let dir = scratch_dir();
        let mut store = CredentialStore::in_dir(&dir).unwrap();
        store.save(sample()).unwrap();
        store.clear().unwrap();
        assert!(!store.path().exists());
        assert!(store.current().is_none());
        assert_eq!(CredentialStore::in_dir(&dir).unwrap().load(), None);
        fs::remove_dir_all(dir).ok();
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = scratch_dir();
        let mut store = CredentialStore::in_dir(&dir).unwrap();
        store.save(sample()).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn failed_removal_still_forgets_the_record() {
        let dir = scratch_dir();
        let mut store = CredentialStore::in_dir(&dir).unwrap();
        store.save(sample()).unwrap();
        let mut rx = store.subscribe();
        fs::remove_file(store.path()).unwrap();
        fs::create_dir(store.path()).unwrap();

        assert!(store.clear().is_err());
        assert!(!store.is_configured());
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn save_replaces_rather_than_merges() {
        let dir = scratch_dir();
        let mut store = CredentialStore::in_dir(&dir).unwrap();
        store.save(sample()).unwrap();
        let other = Credentials::new("AKIAOTHER", "other-secret", "eu-west-1");
        store.save(other.clone()).unwrap();
        assert_eq!(CredentialStore::in_dir(&dir).unwrap().load(), Some(other));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn configured_state_changes_are_observable() {
        let dir = scratch_dir();
        let mut store = CredentialStore::in_dir(&dir).unwrap();
        let mut rx = store.subscribe();
        assert!(!*rx.borrow_and_update());

        store.save(sample()).unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());

        store.clear().unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn debug_output_masks_the_secret() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("secret\""));
        assert!(rendered.contains("********"));
    }
}
