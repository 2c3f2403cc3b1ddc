use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    error::{AsciimateError, AsciimateResult},
    loader::decode_frame,
    model::Frame,
};

/// On-disk cache of generated frames.
///
/// A repeated run with the same model, prompt and input image reuses the
/// stored frame instead of issuing a gateway call. Each entry is a PNG plus
/// a JSON sidecar describing what produced it.
pub struct FrameCache {
    dir: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct CacheMeta {
    model: String,
    prompt: String,
    key: String,
}

impl FrameCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Content key over model id, prompt and the input image's PNG bytes.
    pub fn key(model: &str, prompt: &str, input_png: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update([0]);
        hasher.update(prompt.as_bytes());
        hasher.update([0]);
        hasher.update(input_png);

        let digest = hasher.finalize();
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }

    pub fn lookup(&self, key: &str) -> AsciimateResult<Option<Frame>> {
        let path = self.frame_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path).map_err(|e| {
            AsciimateError::io(format!("failed to read cached frame '{}': {e}", path.display()))
        })?;
        match decode_frame(&bytes) {
            Ok(frame) => {
                tracing::debug!(key, "frame cache hit");
                Ok(Some(frame))
            }
            Err(e) => {
                // A truncated or corrupt entry must not poison every future
                // run; drop it and let the caller refetch.
                tracing::warn!(key, error = %e, "evicting undecodable cache entry");
                let _ = std::fs::remove_file(&path);
                let _ = std::fs::remove_file(self.meta_path(key));
                Ok(None)
            }
        }
    }

    pub fn store(&self, key: &str, model: &str, prompt: &str, frame: &Frame) -> AsciimateResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            AsciimateError::io(format!(
                "failed to create cache dir '{}': {e}",
                self.dir.display()
            ))
        })?;

        let png = frame.to_png_bytes()?;
        let frame_path = self.frame_path(key);
        std::fs::write(&frame_path, &png).map_err(|e| {
            AsciimateError::io(format!(
                "failed to write cached frame '{}': {e}",
                frame_path.display()
            ))
        })?;

        let meta = CacheMeta {
            model: model.to_string(),
            prompt: prompt.to_string(),
            key: key.to_string(),
        };
        let meta_path = self.meta_path(key);
        let json = serde_json::to_vec_pretty(&meta)
            .map_err(|e| AsciimateError::encode(format!("failed to serialize cache meta: {e}")))?;
        std::fs::write(&meta_path, json).map_err(|e| {
            AsciimateError::io(format!(
                "failed to write cache meta '{}': {e}",
                meta_path.display()
            ))
        })?;
        Ok(())
    }

    fn frame_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.png"))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}
