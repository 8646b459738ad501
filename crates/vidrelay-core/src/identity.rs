//! Asset identity scheme.
//!
//! Object keys are laid out as `{ownerId}/{assetId}/...`. The `(ownerId, assetId)` pair is
//! the composite key of the asset everywhere in the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

use crate::error::PipelineError;

/// Length of the generated asset id, in hex characters.
pub const ASSET_ID_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIdentity {
    pub owner_id: String,
    pub asset_id: String,
}

impl AssetIdentity {
    pub fn new(owner_id: impl Into<String>, asset_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            asset_id: asset_id.into(),
        }
    }

    /// Derive the identity from the first two segments of an object key.
    pub fn from_key(key: &str) -> Result<Self, PipelineError> {
        let mut segments = key.split('/');
        let owner = segments.next().unwrap_or_default();
        let asset = segments.next().unwrap_or_default();

        if owner.is_empty() || asset.is_empty() {
            return Err(PipelineError::MalformedKey(format!(
                "expected '{{ownerId}}/{{assetId}}/...', got '{}'",
                key
            )));
        }

        Ok(Self::new(owner, asset))
    }

    /// `{ownerId}/{assetId}`: the prefix of every object belonging to this asset.
    pub fn prefix(&self) -> String {
        format!("{}/{}", self.owner_id, self.asset_id)
    }
}

impl Display for AssetIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.owner_id, self.asset_id)
    }
}

/// New upload key `{ownerId}/{assetId}` for an object that does not exist yet.
pub fn generate_upload_key(owner_id: &str) -> String {
    generate_upload_key_with(owner_id, Utc::now(), Uuid::new_v4())
}

/// Deterministic core of [`generate_upload_key`].
pub fn generate_upload_key_with(owner_id: &str, now: DateTime<Utc>, nonce: Uuid) -> String {
    let seed = format!("{}-{}-{}", owner_id, now.timestamp_millis(), nonce);
    let digest = hex::encode(Sha256::digest(seed.as_bytes()));
    format!("{}/{}", owner_id, &digest[..ASSET_ID_LEN])
}
