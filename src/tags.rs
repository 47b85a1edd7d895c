// src/tags.rs
//
// Tag sync: make sure every requested label exists server-side, then build
// the name -> tag mapping used for the whole run.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::constants::DEFAULT_TAG_TYPE;
use crate::error::{ConfigError, CvBlobError};
use crate::training::{Tag, TagId, TrainingApi};

/// Read-only mapping from tag name to server tag, fixed after sync.
#[derive(Debug, Clone, Default)]
pub struct TagMap {
    by_name: HashMap<String, Tag>,
}

impl TagMap {
    pub fn from_tags(tags: impl IntoIterator<Item = Tag>) -> Self {
        Self {
            by_name: tags.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.by_name.get(name)
    }

    pub fn id(&self, name: &str) -> Result<&TagId, ConfigError> {
        self.get(name)
            .map(|t| &t.id)
            .ok_or_else(|| ConfigError::UnresolvedTag(name.to_string()))
    }

    /// Resolve every name or fail on the first unknown one.
    ///
    /// Ids come back in first-seen order with repeats dropped.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<TagId>, ConfigError> {
        let mut seen = HashSet::new();
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            let id = self.id(name)?;
            if seen.insert(id) {
                ids.push(id.clone());
            }
        }
        Ok(ids)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Create any missing tags, then re-read the project's tags.
///
/// The returned map is guaranteed to contain every name in `names`.
pub async fn sync_tags(
    api: &dyn TrainingApi,
    project_id: &str,
    names: &[String],
) -> Result<TagMap, CvBlobError> {
    let existing = api.list_tags(project_id).await?;
    let known: HashSet<&str> = existing.iter().map(|t| t.name.as_str()).collect();
    debug!("project has {} tags", known.len());

    for name in names.iter().filter(|n| !known.contains(n.as_str())) {
        info!("Creating tag `{}`", name);
        api.create_tag(project_id, name, name, DEFAULT_TAG_TYPE).await?;
    }

    let map = TagMap::from_tags(api.list_tags(project_id).await?);
    map.resolve(names)?;
    Ok(map)
}
