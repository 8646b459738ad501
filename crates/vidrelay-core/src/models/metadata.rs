//! Typed metadata subtrees written by the stage handlers.
//!
//! Each stage owns exactly one subtree of the asset's metadata document and writes it
//! through a [`MetadataUpdate`]. Missing values are stored as an explicit JSON `null` so a
//! previously-populated field can be cleared.

use serde::{Deserialize, Serialize};

/// String values the content inspector uses for "no value".
pub const NULL_SENTINELS: [&str; 2] = ["N/A", "unknown"];

/// Replace sentinel strings with `null`, recursively.
pub fn normalize_sentinels(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match value {
        Value::String(s) if NULL_SENTINELS.contains(&s.as_str()) => Value::Null,
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_sentinels).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, normalize_sentinels(v)))
                .collect(),
        ),
        other => other,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BasicValidation {
    pub exists: bool,
    pub size_in_bytes: u64,
    pub container_format: Option<String>,
    pub detected_formats: Option<String>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub is_valid: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamValidation {
    pub has_video_stream: bool,
    pub has_audio_stream: bool,
    pub is_playable: bool,
    pub has_corrupt_frames: bool,
    pub error: Option<String>,
}

/// Output of `ContentInspector::validate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationReport {
    pub success: bool,
    pub basic: BasicValidation,
    pub stream: StreamValidation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Resolution {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TechnicalMetadata {
    pub container_format: Option<String>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub duration: Option<f64>,
    pub bitrate: Option<u64>,
    pub frame_rate: Option<String>,
    pub resolution: Resolution,
    pub aspect_ratio: Option<String>,
    pub color_space: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CorruptionStatus {
    pub is_corrupted: bool,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioSync {
    pub in_sync: bool,
    pub offset_ms: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QualityMetrics {
    pub video_quality_score: Option<f64>,
    pub audio_quality_score: Option<f64>,
    pub corruption_status: CorruptionStatus,
    pub missing_frames: Option<u64>,
    pub audio_sync: AudioSync,
}

/// Output of `ContentInspector::extract_metadata`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentMetadata {
    pub technical: TechnicalMetadata,
    pub quality: QualityMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingUrls {
    pub hls: String,
    pub iframe: String,
    pub audio: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadUrls {
    pub high: String,
    pub medium: String,
    pub low: String,
    pub mobile: String,
    pub audio: String,
}

/// Public delivery URLs for a finished asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionUrls {
    pub streaming: StreamingUrls,
    pub downloads: DownloadUrls,
    pub thumbnail: String,
}

impl DistributionUrls {
    /// Pure templating over `https://{cdn_domain}/{owner}/{asset}/...`.
    pub fn generate(cdn_domain: &str, owner_id: &str, asset_id: &str) -> Self {
        let base = format!(
            "https://{}/{}/{}",
            cdn_domain.trim_end_matches('/'),
            owner_id,
            asset_id
        );

        Self {
            streaming: StreamingUrls {
                hls: format!("{}/hls/master.m3u8", base),
                iframe: format!("{}/hls/master_iframe.m3u8", base),
                audio: format!("{}/hls/audio/stream.m3u8", base),
            },
            downloads: DownloadUrls {
                high: format!("{}/mp4/1080p.mp4", base),
                medium: format!("{}/mp4/720p.mp4", base),
                low: format!("{}/mp4/480p.mp4", base),
                mobile: format!("{}/mp4/360p.mp4", base),
                audio: format!("{}/mp4/audio.m4a", base),
            },
            thumbnail: format!("{}/assets/thumbnail.png", base),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationMetadata {
    pub basic: Option<BasicValidation>,
    pub stream: Option<StreamValidation>,
}

/// Metadata document stored alongside the progress map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetMetadata {
    pub validation: ValidationMetadata,
    pub technical: Option<TechnicalMetadata>,
    pub quality: Option<QualityMetrics>,
    pub distribution: Option<DistributionUrls>,
}

/// A write to exactly one metadata subtree.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataUpdate {
    Basic(BasicValidation),
    Stream(StreamValidation),
    Technical(TechnicalMetadata),
    Quality(QualityMetrics),
    Distribution(DistributionUrls),
}

impl MetadataUpdate {
    /// Path of the subtree inside the metadata document.
    pub fn path(&self) -> &'static [&'static str] {
        match self {
            MetadataUpdate::Basic(_) => &["validation", "basic"],
            MetadataUpdate::Stream(_) => &["validation", "stream"],
            MetadataUpdate::Technical(_) => &["technical"],
            MetadataUpdate::Quality(_) => &["quality"],
            MetadataUpdate::Distribution(_) => &["distribution"],
        }
    }

    /// Stored form of the subtree, with sentinels normalized to `null`.
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        let value = match self {
            MetadataUpdate::Basic(v) => serde_json::to_value(v)?,
            MetadataUpdate::Stream(v) => serde_json::to_value(v)?,
            MetadataUpdate::Technical(v) => serde_json::to_value(v)?,
            MetadataUpdate::Quality(v) => serde_json::to_value(v)?,
            MetadataUpdate::Distribution(v) => serde_json::to_value(v)?,
        };
        Ok(normalize_sentinels(value))
    }

    pub fn apply(&self, metadata: &mut AssetMetadata) {
        match self {
            MetadataUpdate::Basic(v) => metadata.validation.basic = Some(normalized(v)),
            MetadataUpdate::Stream(v) => metadata.validation.stream = Some(normalized(v)),
            MetadataUpdate::Technical(v) => metadata.technical = Some(normalized(v)),
            MetadataUpdate::Quality(v) => metadata.quality = Some(normalized(v)),
            MetadataUpdate::Distribution(v) => metadata.distribution = Some(v.clone()),
        }
    }
}

/// Round-trip through the normalizer so in-memory state matches the stored form.
fn normalized<T>(value: &T) -> T
where
    T: Serialize + serde::de::DeserializeOwned + Clone,
{
    serde_json::to_value(value)
        .map(normalize_sentinels)
        .and_then(serde_json::from_value)
        .unwrap_or_else(|_| value.clone())
}
