//! JSON fixture for the in-memory store.
//!
//! Contents and subscriptions are owned by other services in a full deployment. Without a
//! database the memory store starts empty, so a fixture is the only way to make viewers and
//! owners usable.

use std::{fs, io, path::Path};

use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use super::MemoryTheaterStore;
use crate::dao::models::ContentEntity;

/// Environment variable naming the fixture file.
pub const SEED_PATH_ENV: &str = "THEATER_BACK_SEED_PATH";

/// Failure while loading a fixture.
#[derive(Debug, Error)]
pub enum SeedError {
    /// The file could not be read.
    #[error("failed to read seed file `{path}`")]
    Read {
        /// Offending path.
        path: String,
        #[source]
        source: io::Error,
    },
    /// The file is not a valid fixture.
    #[error("failed to parse seed file `{path}`")]
    Parse {
        /// Offending path.
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Fixture layout: `{ "contents": [...], "subscriptions": [...] }`.
#[derive(Debug, Default, Deserialize)]
pub struct MemorySeed {
    /// Content items available for scheduling.
    #[serde(default)]
    pub contents: Vec<SeedContent>,
    /// Viewer subscriptions.
    #[serde(default)]
    pub subscriptions: Vec<SeedSubscription>,
}

/// One content item of a fixture. Counters always start at zero.
#[derive(Debug, Deserialize)]
pub struct SeedContent {
    /// Content identifier.
    pub id: Uuid,
    /// Owning account.
    pub owner_id: Uuid,
    /// Display title.
    pub title: String,
    /// Unpublished content cannot be scheduled.
    #[serde(default = "published_by_default")]
    pub published: bool,
}

/// One viewer subscription of a fixture.
#[derive(Debug, Deserialize)]
pub struct SeedSubscription {
    /// Subscribed viewer.
    pub viewer_id: Uuid,
    /// Whether the subscription grants entry.
    #[serde(default = "active_by_default")]
    pub active: bool,
}

fn published_by_default() -> bool {
    true
}

fn active_by_default() -> bool {
    true
}

impl MemorySeed {
    /// Read and parse a fixture file.
    pub fn from_path(path: &Path) -> Result<Self, SeedError> {
        let display = path.display().to_string();
        let contents = fs::read_to_string(path).map_err(|source| SeedError::Read {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| SeedError::Parse {
            path: display,
            source,
        })
    }

    /// Register every fixture row in `store`, replacing rows with the same id.
    pub fn apply(self, store: &MemoryTheaterStore) {
        for content in self.contents {
            store.insert_content(ContentEntity {
                id: content.id,
                owner_id: content.owner_id,
                title: content.title,
                published: content.published,
                total_view: 0,
                month_view: 0,
            });
        }
        for subscription in self.subscriptions {
            store.set_subscription(subscription.viewer_id, subscription.active);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::theater_store::TheaterStore;

    const FIXTURE: &str = r#"{
        "contents": [
            { "id": "8f1c7a52-3d0e-4f43-9a55-1d2b6f7e8a90", "owner_id": "0b5d3e1c-8a7f-4c6d-9e2b-3f4a5b6c7d8e", "title": "Night Train" },
            { "id": "a3e9b7c1-5f2d-4e8a-b6c0-7d1e2f3a4b5c", "owner_id": "0b5d3e1c-8a7f-4c6d-9e2b-3f4a5b6c7d8e", "title": "Draft", "published": false }
        ],
        "subscriptions": [
            { "viewer_id": "c7d8e9f0-1a2b-4c3d-8e5f-6a7b8c9d0e1f" },
            { "viewer_id": "d1e2f3a4-b5c6-4d7e-8f9a-0b1c2d3e4f5a", "active": false }
        ]
    }"#;

    #[tokio::test]
    async fn fixture_rows_become_usable_contents_and_viewers() {
        let seed: MemorySeed = serde_json::from_str(FIXTURE).unwrap();
        let store = MemoryTheaterStore::new();
        seed.apply(&store);

        let night_train: Uuid = "8f1c7a52-3d0e-4f43-9a55-1d2b6f7e8a90".parse().unwrap();
        let content = store.find_content(night_train).await.unwrap().unwrap();
        assert_eq!(content.title, "Night Train");
        assert!(content.published);
        assert_eq!(content.total_view, 0);

        let draft: Uuid = "a3e9b7c1-5f2d-4e8a-b6c0-7d1e2f3a4b5c".parse().unwrap();
        assert!(!store.find_content(draft).await.unwrap().unwrap().published);

        let active: Uuid = "c7d8e9f0-1a2b-4c3d-8e5f-6a7b8c9d0e1f".parse().unwrap();
        let lapsed: Uuid = "d1e2f3a4-b5c6-4d7e-8f9a-0b1c2d3e4f5a".parse().unwrap();
        assert!(store.subscription_is_active(active).await.unwrap());
        assert!(!store.subscription_is_active(lapsed).await.unwrap());
    }

    #[test]
    fn missing_files_are_read_errors() {
        let err = MemorySeed::from_path(Path::new("/nonexistent/seed.json")).unwrap_err();
        assert!(matches!(err, SeedError::Read { .. }));
    }

    #[test]
    fn empty_fixture_is_valid() {
        let seed: MemorySeed = serde_json::from_str("{}").unwrap();
        assert!(seed.contents.is_empty());
        assert!(seed.subscriptions.is_empty());
    }

    #[test]
    fn shipped_example_fixture_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/seed.example.json");
        let seed = MemorySeed::from_path(&path).unwrap();
        assert_eq!(seed.contents.len(), 1);
        assert_eq!(seed.subscriptions.len(), 1);
    }
}
