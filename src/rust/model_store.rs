use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const DEFAULT_HUB_URL: &str = "https://huggingface.co";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model not downloaded: {0}")]
    NotDownloaded(String),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("Download of {url} failed with status {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
}

/// Where a hub model lives and, optionally, the digests its files must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    /// Hub repository id, e.g. `org/bert-finetuned`
    pub repo: String,
    pub model_hash: Option<String>,
    pub tokenizer_hash: Option<String>,
}

impl ModelSpec {
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            model_hash: None,
            tokenizer_hash: None,
        }
    }

    pub fn with_hashes(mut self, model_hash: impl Into<String>, tokenizer_hash: impl Into<String>) -> Self {
        self.model_hash = Some(model_hash.into());
        self.tokenizer_hash = Some(tokenizer_hash.into());
        self
    }
}

/// Local paths of a resolved model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub dir: PathBuf,
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

impl ModelFiles {
    fn in_dir(dir: PathBuf) -> Self {
        Self {
            model_path: dir.join(MODEL_FILE),
            tokenizer_path: dir.join(TOKENIZER_FILE),
            dir,
        }
    }

    fn exist(&self) -> bool {
        self.model_path.exists() && self.tokenizer_path.exists()
    }
}

/// Cache of exported classifiers, fetched from a model hub on first use.
#[derive(Clone, Debug)]
pub struct ModelStore {
    cache_dir: PathBuf,
    base_url: String,
    download_lock: Arc<Mutex<()>>,
}

impl ModelStore {
    /// Creates a store in the default cache directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::default_cache_dir())
    }

    /// Returns the default cache directory path
    pub fn default_cache_dir() -> PathBuf {
        if let Ok(path) = env::var("FINETUNE_EVAL_CACHE") {
            return PathBuf::from(path).join("models");
        }
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("finetune-eval").join("models");
        }
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("finetune-eval").join("models");
        }
        env::temp_dir().join("finetune-eval").join("models")
    }

    pub fn new<P: AsRef<Path>>(cache_dir: P) -> io::Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            cache_dir,
            base_url: DEFAULT_HUB_URL.to_string(),
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Points downloads at another hub mirror.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn model_files(&self, repo: &str) -> ModelFiles {
        ModelFiles::in_dir(self.cache_dir.join(repo.replace('/', "--")))
    }

    pub fn file_url(&self, repo: &str, file: &str) -> String {
        format!("{}/{}/resolve/main/{}", self.base_url, repo, file)
    }

    pub fn is_downloaded(&self, repo: &str) -> bool {
        let files = self.model_files(repo);
        log::debug!("Checking cached model files in {:?}", files.dir);
        files.exist()
    }

    /// Resolves `reference` to local model files.
    ///
    /// A directory holding both model files is used as-is. Anything else is
    /// treated as a hub repository id and fetched into the cache when missing.
    pub async fn resolve(&self, reference: &str) -> Result<ModelFiles, ModelError> {
        let local = Path::new(reference);
        if local.is_dir() {
            let files = ModelFiles::in_dir(local.to_path_buf());
            if files.exist() {
                log::info!("Using local model directory {:?}", local);
                return Ok(files);
            }
            return Err(ModelError::NotDownloaded(format!(
                "{:?} does not contain {} and {}",
                local, MODEL_FILE, TOKENIZER_FILE
            )));
        }
        self.ensure_downloaded(&ModelSpec::new(reference)).await
    }

    /// Ensures that both files of `spec` are cached and match their digests,
    /// downloading whatever is missing or stale.
    pub async fn ensure_downloaded(&self, spec: &ModelSpec) -> Result<ModelFiles, ModelError> {
        let _lock = self.download_lock.lock().await;
        let files = self.model_files(&spec.repo);
        fs::create_dir_all(&files.dir)?;

        let model_result = self
            .fetch_if_stale(&spec.repo, MODEL_FILE, &files.model_path, spec.model_hash.as_deref())
            .await;
        let result = match model_result {
            Ok(()) => {
                self.fetch_if_stale(
                    &spec.repo,
                    TOKENIZER_FILE,
                    &files.tokenizer_path,
                    spec.tokenizer_hash.as_deref(),
                )
                .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                log::info!("Model {} ready in {:?}", spec.repo, files.dir);
                Ok(files)
            }
            Err(e) => {
                log::error!("Failed to set up model {}: {}", spec.repo, e);
                let _ = self.remove_download(&spec.repo);
                Err(e)
            }
        }
    }

    async fn fetch_if_stale(
        &self,
        repo: &str,
        file: &str,
        path: &Path,
        expected_hash: Option<&str>,
    ) -> Result<(), ModelError> {
        if path.exists() {
            match expected_hash {
                None => return Ok(()),
                Some(hash) if verify_file(path, hash)? => return Ok(()),
                Some(_) => log::warn!("Cached {} failed verification, redownloading", file),
            }
        }
        let url = self.file_url(repo, file);
        download_file(&url, path, expected_hash, file).await
    }

    /// Checks cached files against the digests of `spec`; missing files count as unverified.
    pub fn verify(&self, spec: &ModelSpec) -> Result<bool, ModelError> {
        let files = self.model_files(&spec.repo);
        if !files.exist() {
            return Ok(false);
        }
        let model_ok = match &spec.model_hash {
            Some(hash) => verify_file(&files.model_path, hash)?,
            None => true,
        };
        let tokenizer_ok = match &spec.tokenizer_hash {
            Some(hash) => verify_file(&files.tokenizer_path, hash)?,
            None => true,
        };
        Ok(model_ok && tokenizer_ok)
    }

    pub fn remove_download(&self, repo: &str) -> Result<(), ModelError> {
        let files = self.model_files(repo);
        if files.model_path.exists() {
            fs::remove_file(&files.model_path)?;
        }
        if files.tokenizer_path.exists() {
            fs::remove_file(&files.tokenizer_path)?;
        }
        Ok(())
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn verify_file(path: &Path, expected_hash: &str) -> Result<bool, ModelError> {
    let bytes = fs::read(path)?;
    let hash = sha256_hex(&bytes);
    log::debug!("{:?}: sha256 {} (expected {})", path, hash, expected_hash);
    Ok(hash.eq_ignore_ascii_case(expected_hash))
}

async fn download_file(
    url: &str,
    path: &Path,
    expected_hash: Option<&str>,
    file_type: &str,
) -> Result<(), ModelError> {
    log::info!("Downloading {} from {}", file_type, url);
    let response = reqwest::get(url).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ModelError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let bytes = response.bytes().await?;
    log::info!("Downloaded {} bytes", bytes.len());

    if let Some(expected) = expected_hash {
        let actual = sha256_hex(&bytes);
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(ModelError::HashMismatch {
                file_type: file_type.to_string(),
                expected: expected.to_string(),
                actual,
            });
        }
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &bytes)?;
    Ok(())
}
