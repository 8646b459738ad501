//! Object-store "object created" notifications, as delivered through the intake and
//! completion queues.

use serde::{Deserialize, Serialize};

/// Envelope of a bucket notification. Test events carry no `Records` at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectNotification {
    #[serde(rename = "Records", default)]
    pub records: Vec<ObjectEventRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectEventRecord {
    #[serde(default)]
    pub event_name: Option<String>,
    pub s3: ObjectEventEntity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectEventEntity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRef {
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl ObjectEventRecord {
    /// Object key with the notification's URL form-encoding removed.
    pub fn decoded_key(&self) -> String {
        let plus_decoded = self.s3.object.key.replace('+', " ");
        urlencoding::decode(&plus_decoded)
            .map(|k| k.into_owned())
            .unwrap_or(plus_decoded)
    }
}

impl ObjectNotification {
    /// Build a single-record notification, mainly for producers and tests.
    pub fn for_key(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            records: vec![ObjectEventRecord {
                event_name: Some("ObjectCreated:Put".to_string()),
                s3: ObjectEventEntity {
                    bucket: BucketRef { name: bucket.into() },
                    object: ObjectRef {
                        key: key.into(),
                        size: None,
                    },
                },
            }],
        }
    }
}
