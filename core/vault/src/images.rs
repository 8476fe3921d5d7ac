//! Encrypted image blobs.
//!
//! Images are stored under `images/YYYY/MM/<uuid>.<ext>` as a small
//! binary envelope: an 8-byte magic, one suite tag byte, the 12-byte
//! nonce, then the ciphertext. The extension on the filename records
//! the original format but the bytes on disk are always opaque.

use std::collections::{HashMap, VecDeque};
use std::path::{Component, Path, PathBuf};

use chrono::{Datelike, Utc};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::fs::write_atomic;
use crate::session::{Vault, IMAGES_DIRNAME};
use inkvault_common::{Error, Result};
use inkvault_crypto::{decrypt, encrypt, CipherSuite, MasterKey, NONCE_LENGTH};

const IMAGE_MAGIC: &[u8; 8] = b"INKVIMG1";
const IMAGE_AAD: &[u8] = b"image";

/// Upper bound on decrypted bytes held by the in-session cache.
const CACHE_BUDGET: usize = 32 * 1024 * 1024;

/// Build the on-disk envelope for one image.
pub(crate) fn seal_image(
    suite: CipherSuite,
    key: &MasterKey,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let (nonce, ciphertext) = encrypt(suite, key.as_bytes(), plaintext, IMAGE_AAD)?;
    let mut sealed = Vec::with_capacity(IMAGE_MAGIC.len() + 1 + NONCE_LENGTH + ciphertext.len());
    sealed.extend_from_slice(IMAGE_MAGIC);
    sealed.push(suite.tag_byte());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Parse and decrypt an image envelope.
pub(crate) fn open_image(key: &MasterKey, sealed: &[u8]) -> Result<(CipherSuite, Vec<u8>)> {
    let header = IMAGE_MAGIC.len() + 1 + NONCE_LENGTH;
    if sealed.len() < header || &sealed[..IMAGE_MAGIC.len()] != IMAGE_MAGIC {
        return Err(Error::VaultCorrupt(
            "image blob has no valid envelope header".to_string(),
        ));
    }
    let suite = CipherSuite::from_tag_byte(sealed[IMAGE_MAGIC.len()]).ok_or_else(|| {
        Error::VaultCorrupt(format!(
            "image blob carries unknown cipher tag {}",
            sealed[IMAGE_MAGIC.len()]
        ))
    })?;
    let mut nonce = [0u8; NONCE_LENGTH];
    nonce.copy_from_slice(&sealed[IMAGE_MAGIC.len() + 1..header]);
    let plaintext = decrypt(suite, key.as_bytes(), &nonce, &sealed[header..], IMAGE_AAD)?;
    Ok((suite, plaintext))
}

/// Pick a file extension for a clipboard item. The filename's own
/// extension wins; the MIME type is the fallback, then `bin`.
fn infer_image_extension(name: Option<&str>, mime: Option<&str>) -> &'static str {
    let ext = name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => return "png",
        Some("jpg") | Some("jpeg") => return "jpg",
        Some("gif") => return "gif",
        Some("webp") => return "webp",
        Some("bmp") => return "bmp",
        Some("svg") => return "svg",
        _ => {}
    }
    match mime {
        Some("image/png") => "png",
        Some("image/jpeg") | Some("image/jpg") => "jpg",
        Some("image/gif") => "gif",
        Some("image/webp") => "webp",
        Some("image/bmp") => "bmp",
        Some("image/svg+xml") => "svg",
        _ => "bin",
    }
}

/// Map a vault-relative path onto the filesystem, rejecting anything
/// that would escape the root.
fn resolve_relative(root: &Path, relative: &str) -> Result<PathBuf> {
    let normalized = relative.replace('\\', "/");
    let path = Path::new(&normalized);
    if path.has_root() {
        return Err(Error::InvalidInput(format!(
            "Image path must be relative to the vault root: {relative}"
        )));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            _ => {
                return Err(Error::InvalidInput(format!(
                    "Image path escapes the vault root: {relative}"
                )));
            }
        }
    }
    Ok(root.join(path))
}

/// Plaintext cache for decrypted images, evicting oldest-first once the
/// byte budget is exceeded. Lives inside the session so locking drops
/// every decrypted blob.
pub(crate) struct ImageCache {
    map: HashMap<PathBuf, Vec<u8>>,
    order: VecDeque<PathBuf>,
    bytes: usize,
}

impl ImageCache {
    pub(crate) fn new() -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            bytes: 0,
        }
    }

    pub(crate) fn get(&self, path: &Path) -> Option<Vec<u8>> {
        self.map.get(path).cloned()
    }

    pub(crate) fn insert(&mut self, path: PathBuf, plaintext: Vec<u8>) {
        if plaintext.len() > CACHE_BUDGET || self.map.contains_key(&path) {
            return;
        }
        while self.bytes + plaintext.len() > CACHE_BUDGET {
            let Some(evicted) = self.order.pop_front() else {
                break;
            };
            if let Some(old) = self.map.remove(&evicted) {
                self.bytes -= old.len();
            }
        }
        self.bytes += plaintext.len();
        self.order.push_back(path.clone());
        self.map.insert(path, plaintext);
    }
}

impl Vault {
    /// Encrypt an image file from outside the vault and store it under
    /// `images/YYYY/MM/`. Returns the vault-relative path to embed in
    /// entry content.
    pub async fn store_image(&self, source: &Path) -> Result<String> {
        let _gate = self.write_gate.lock().await;
        let snapshot = self.snapshot().await?;

        let data = match fs::read(source).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::InvalidInput(format!(
                    "Image file not found: {}",
                    source.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| "bin".to_string());

        self.write_image(&snapshot, &data, &extension).await
    }

    /// Encrypt raw clipboard bytes and store them like `store_image`.
    pub async fn import_clipboard_image(
        &self,
        data: Vec<u8>,
        mime: Option<&str>,
        name: Option<&str>,
    ) -> Result<String> {
        if data.is_empty() {
            return Err(Error::InvalidInput(
                "Clipboard image is empty".to_string(),
            ));
        }

        let _gate = self.write_gate.lock().await;
        let snapshot = self.snapshot().await?;
        let extension = infer_image_extension(name, mime);

        self.write_image(&snapshot, &data, extension).await
    }

    /// Decrypt one stored image by its vault-relative path, serving
    /// repeats from the session cache.
    pub async fn decrypt_image(&self, relative: &str) -> Result<Vec<u8>> {
        let snapshot = self.snapshot().await?;
        let resolved = resolve_relative(self.root(), relative)?;

        {
            let state = self.state.read().await;
            let state = state.as_ref().ok_or(Error::Locked)?;
            if let Some(cached) = state.image_cache.get(&resolved) {
                debug!(path = relative, "Image served from cache");
                return Ok(cached);
            }
        }

        let sealed = match fs::read(&resolved).await {
            Ok(sealed) => sealed,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ImageNotFound(relative.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let (_, plaintext) = open_image(&snapshot.key, &sealed)?;

        let mut state = self.state.write().await;
        let state = state.as_mut().ok_or(Error::Locked)?;
        state.image_cache.insert(resolved, plaintext.clone());
        Ok(plaintext)
    }

    async fn write_image(
        &self,
        snapshot: &crate::session::KeySnapshot,
        data: &[u8],
        extension: &str,
    ) -> Result<String> {
        let now = Utc::now();
        let relative = format!(
            "{IMAGES_DIRNAME}/{}/{:02}/{}.{extension}",
            now.year(),
            now.month(),
            Uuid::new_v4()
        );
        let sealed = seal_image(snapshot.algorithm, &snapshot.key, data)?;
        write_atomic(&self.root().join(&relative), &sealed).await?;

        info!(path = %relative, bytes = data.len(), "Image stored");
        Ok(relative)
    }
}
