use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};

const ACCESS_TOKEN_KEY: &str = "accessToken";
const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Durable token storage: two whole-value entries under the config
/// directory, one file per key. Absence of the access token means
/// anonymous / logged out. Both the request pipeline and the session
/// store write here; every write replaces the whole value, so the two
/// writers never race on partial state.
#[derive(Debug, Clone)]
pub struct TokenStorage {
    dir: PathBuf,
}

impl TokenStorage {
    pub fn new() -> Result<Self> {
        let dir = directories::ProjectDirs::from("com", "momentbox", "momentbox")
            .context("Failed to get config directory")?
            .config_dir()
            .to_path_buf();

        Self::at(dir).context("Failed to create token storage directory")
    }

    /// Storage rooted at an explicit directory. Tests point this at a
    /// temporary directory.
    pub fn at(dir: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    pub fn store_access_token(&self, token: &str) -> io::Result<()> {
        self.write(ACCESS_TOKEN_KEY, token)
    }

    pub fn store_refresh_token(&self, token: &str) -> io::Result<()> {
        self.write(REFRESH_TOKEN_KEY, token)
    }

    pub fn clear_refresh_token(&self) {
        let _ = fs::remove_file(self.path(REFRESH_TOKEN_KEY));
    }

    /// Remove both tokens. Best-effort and idempotent.
    pub fn clear(&self) {
        let _ = fs::remove_file(self.path(ACCESS_TOKEN_KEY));
        let _ = fs::remove_file(self.path(REFRESH_TOKEN_KEY));
    }

    fn read(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path(key))
            .ok()
            .filter(|s| !s.is_empty())
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        let path = self.path(key);
        fs::write(&path, value)?;

        // Tokens are credentials: owner read/write only on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }
}
