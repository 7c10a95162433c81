//! Persisted client state: string items plus a small cookie jar.
//!
//! Stands in for browser `localStorage` and `document.cookie`. When opened
//! from a path, every mutation is written back as JSON with restricted
//! permissions (0600). Token values are never logged.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store key and cookie name holding the admin bearer token.
pub const TOKEN_KEY: &str = "adminToken";

/// A cookie as kept by the jar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub value: String,
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    items: BTreeMap<String, String>,
    #[serde(default)]
    cookies: BTreeMap<String, StoredCookie>,
}

/// Key/value items and cookies, optionally backed by a JSON file.
#[derive(Debug)]
pub struct ClientStore {
    path: Option<PathBuf>,
    data: Mutex<StoreData>,
}

impl ClientStore {
    /// Creates a store that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Mutex::new(StoreData::default()),
        }
    }

    /// Opens a file-backed store. A missing file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read client store {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse client store {}", path.display()))?
        } else {
            StoreData::default()
        };
        Ok(Self {
            path: Some(path),
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, StoreData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.lock().items.get(key).cloned()
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut data = self.lock();
        data.items.insert(key.to_string(), value.to_string());
        self.persist(&data)
    }

    pub fn remove_item(&self, key: &str) -> Result<()> {
        let mut data = self.lock();
        if data.items.remove(key).is_some() {
            self.persist(&data)?;
        }
        Ok(())
    }

    /// Applies a cookie string with Set-Cookie semantics.
    ///
    /// An `expires` attribute in the past (or `max-age=0`) deletes the cookie.
    pub fn set_cookie(&self, raw: &str) -> Result<()> {
        let parsed = parse_cookie(raw, Utc::now())?;
        let mut data = self.lock();
        match parsed {
            ParsedCookie::Set { name, cookie } => {
                data.cookies.insert(name, cookie);
            }
            ParsedCookie::Delete { name } => {
                data.cookies.remove(&name);
            }
        }
        self.persist(&data)
    }

    pub fn cookie(&self, name: &str) -> Option<StoredCookie> {
        self.lock().cookies.get(name).cloned()
    }

    /// Returns the `Cookie` request header value for all stored cookies.
    pub fn cookie_header(&self) -> Option<String> {
        let data = self.lock();
        if data.cookies.is_empty() {
            return None;
        }
        let header = data
            .cookies
            .iter()
            .map(|(name, cookie)| format!("{name}={}", cookie.value))
            .collect::<Vec<_>>()
            .join("; ");
        Some(header)
    }

    fn persist(&self, data: &StoreData) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents =
            serde_json::to_string_pretty(data).context("Failed to serialize client store")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)
                .with_context(|| format!("Failed to open {} for writing", path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(path, contents)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }

        Ok(())
    }
}

/// Cookie string that stores the admin token for server-side middleware.
pub fn admin_token_cookie(token: &str) -> String {
    format!("{TOKEN_KEY}={token}; path=/; secure; samesite=strict")
}

/// Cookie string that clears the admin token cookie.
pub fn clear_admin_token_cookie() -> String {
    format!("{TOKEN_KEY}=; path=/; expires=Thu, 01 Jan 1970 00:00:01 GMT")
}

#[derive(Debug)]
enum ParsedCookie {
    Set { name: String, cookie: StoredCookie },
    Delete { name: String },
}

fn parse_cookie(raw: &str, now: DateTime<Utc>) -> Result<ParsedCookie> {
    let mut parts = raw.split(';').map(str::trim);
    let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
        bail!("Malformed cookie: missing name=value pair");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Malformed cookie: empty name");
    }

    let mut cookie = StoredCookie {
        value: value.trim().to_string(),
        path: "/".to_string(),
        secure: false,
        same_site: None,
    };
    let mut expired = false;

    for attr in parts.filter(|p| !p.is_empty()) {
        let (key, val) = attr.split_once('=').unwrap_or((attr, ""));
        match key.trim().to_ascii_lowercase().as_str() {
            "path" => cookie.path = val.trim().to_string(),
            "secure" => cookie.secure = true,
            "samesite" => cookie.same_site = Some(val.trim().to_ascii_lowercase()),
            "expires" => {
                let at = DateTime::parse_from_rfc2822(val.trim())
                    .with_context(|| format!("Malformed cookie expiry: {val}"))?;
                expired = at.with_timezone(&Utc) <= now;
            }
            "max-age" => {
                expired = val.trim().parse::<i64>().is_ok_and(|secs| secs <= 0);
            }
            _ => {}
        }
    }

    let name = name.to_string();
    if expired {
        Ok(ParsedCookie::Delete { name })
    } else {
        Ok(ParsedCookie::Set { name, cookie })
    }
}
