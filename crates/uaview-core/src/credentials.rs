// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Stored connection identities.
//!
//! The core never decides how credentials and certificate material are
//! persisted. A [`CredentialStore`] hands back an [`IdentityProfile`] for an
//! opaque id; the builder copies its parts into the connection it creates.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ConfigurationError, UaError, UaResult};
use crate::transport::{ClientCertificate, IdentityToken};

// =============================================================================
// Credentials
// =============================================================================

/// Username and password pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Creates a credential pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns `true` when both parts are present.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    /// Converts into the identity presented at session activation.
    ///
    /// Anything short of a complete pair falls back to anonymous.
    pub fn identity_token(&self) -> IdentityToken {
        if self.is_complete() {
            IdentityToken::UserName {
                username: self.username.clone(),
                password: self.password.clone(),
            }
        } else {
            IdentityToken::Anonymous
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

// =============================================================================
// IdentityProfile
// =============================================================================

/// Everything a store can supply for one connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityProfile {
    /// User credentials.
    pub credentials: Option<Credentials>,
    /// Client certificate and key.
    pub certificate: Option<ClientCertificate>,
    /// DER-encoded trusted certificates.
    pub trust_list: Vec<Vec<u8>>,
    /// DER-encoded revoked certificates.
    pub revoked_list: Vec<Vec<u8>>,
}

impl IdentityProfile {
    /// Profile carrying only credentials.
    pub fn with_credentials(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Some(Credentials::new(username, password)),
            ..Default::default()
        }
    }
}

// =============================================================================
// CredentialStore Trait
// =============================================================================

/// Source of identity profiles keyed by an opaque id.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns the store name.
    fn name(&self) -> &str;

    /// Loads a profile. Unknown ids yield `Ok(None)`.
    async fn load(&self, id: &str) -> UaResult<Option<IdentityProfile>>;

    /// Saves a profile, replacing any previous one.
    async fn save(&self, id: &str, profile: IdentityProfile) -> UaResult<()>;

    /// Removes a profile. Returns whether it existed.
    async fn remove(&self, id: &str) -> UaResult<bool>;

    /// Lists stored ids.
    async fn list(&self) -> UaResult<Vec<String>>;
}

// =============================================================================
// MemoryCredentialStore
// =============================================================================

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    profiles: RwLock<HashMap<String, IdentityProfile>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self, id: &str) -> UaResult<Option<IdentityProfile>> {
        Ok(self.profiles.read().await.get(id).cloned())
    }

    async fn save(&self, id: &str, profile: IdentityProfile) -> UaResult<()> {
        self.profiles.write().await.insert(id.to_string(), profile);
        Ok(())
    }

    async fn remove(&self, id: &str) -> UaResult<bool> {
        Ok(self.profiles.write().await.remove(id).is_some())
    }

    async fn list(&self) -> UaResult<Vec<String>> {
        let mut ids: Vec<String> = self.profiles.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

// =============================================================================
// FileCredentialStore
// =============================================================================

/// On-disk layout of one profile. Binary material is base64.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfileFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    credentials: Option<Credentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    certificate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    private_key: Option<String>,
    #[serde(default)]
    trust_list: Vec<String>,
    #[serde(default)]
    revoked_list: Vec<String>,
}

impl ProfileFile {
    fn from_profile(profile: &IdentityProfile) -> Self {
        Self {
            credentials: profile.credentials.clone(),
            certificate: profile.certificate.as_ref().map(|c| STANDARD.encode(&c.certificate)),
            private_key: profile.certificate.as_ref().map(|c| STANDARD.encode(&c.private_key)),
            trust_list: profile.trust_list.iter().map(|der| STANDARD.encode(der)).collect(),
            revoked_list: profile.revoked_list.iter().map(|der| STANDARD.encode(der)).collect(),
        }
    }

    fn into_profile(self, id: &str) -> UaResult<IdentityProfile> {
        let decode = |field: &str, text: &str| {
            STANDARD.decode(text).map_err(|e| {
                UaError::configuration(ConfigurationError::invalid_value(
                    format!("{id}.{field}"),
                    e.to_string(),
                ))
            })
        };

        let certificate = match (self.certificate, self.private_key) {
            (Some(cert), Some(key)) => Some(ClientCertificate {
                certificate: decode("certificate", &cert)?,
                private_key: decode("private_key", &key)?,
            }),
            (None, None) => None,
            _ => {
                return Err(UaError::configuration(ConfigurationError::invalid_value(
                    format!("{id}.certificate"),
                    "certificate and private_key must be given together",
                )))
            }
        };

        Ok(IdentityProfile {
            credentials: self.credentials,
            certificate,
            trust_list: self
                .trust_list
                .iter()
                .map(|der| decode("trust_list", der))
                .collect::<UaResult<_>>()?,
            revoked_list: self
                .revoked_list
                .iter()
                .map(|der| decode("revoked_list", der))
                .collect::<UaResult<_>>()?,
        })
    }
}

/// Directory of `<id>.json` profile files.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    base_dir: PathBuf,
}

impl FileCredentialStore {
    /// Creates a store rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path(&self, id: &str) -> UaResult<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(UaError::configuration(ConfigurationError::invalid_value(
                "credential id",
                format!("'{id}' is not a plain file name"),
            )));
        }
        Ok(self.base_dir.join(format!("{id}.json")))
    }

    fn io_error(path: &std::path::Path, e: impl fmt::Display) -> UaError {
        UaError::configuration(ConfigurationError::invalid_value(
            path.display().to_string(),
            e.to_string(),
        ))
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self, id: &str) -> UaResult<Option<IdentityProfile>> {
        let path = self.path(id)?;
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::io_error(&path, e)),
        };
        let file: ProfileFile =
            serde_json::from_str(&text).map_err(|e| Self::io_error(&path, e))?;
        debug!(store = "file", id, "Loaded identity profile");
        file.into_profile(id).map(Some)
    }

    async fn save(&self, id: &str, profile: IdentityProfile) -> UaResult<()> {
        let path = self.path(id)?;
        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| Self::io_error(&self.base_dir, e))?;
        let text = serde_json::to_string_pretty(&ProfileFile::from_profile(&profile))
            .map_err(|e| Self::io_error(&path, e))?;
        tokio::fs::write(&path, text)
            .await
            .map_err(|e| Self::io_error(&path, e))
    }

    async fn remove(&self, id: &str) -> UaResult<bool> {
        let path = self.path(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::io_error(&path, e)),
        }
    }

    async fn list(&self) -> UaResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io_error(&self.base_dir, e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Self::io_error(&self.base_dir, e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
