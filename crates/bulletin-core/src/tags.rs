use bulletin_shared::{TagGroupDto, TagGroupsEnvelope};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: Option<u64>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagGroup {
    pub id: Option<u64>,
    pub name: String,
    pub tags: Vec<Tag>,
}

impl From<TagGroupDto> for TagGroup {
    fn from(dto: TagGroupDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            tags: dto
                .tags
                .into_iter()
                .map(|tag| Tag {
                    id: tag.id,
                    name: tag.name,
                })
                .collect(),
        }
    }
}

/// Tag groups for the session. Filled by one fetch and only ever replaced
/// as a whole.
#[derive(Debug, Clone, Default)]
pub struct TagCache {
    groups: Option<Vec<TagGroup>>,
    fetches: u64,
}

impl TagCache {
    pub fn is_loaded(&self) -> bool {
        self.groups.is_some()
    }

    pub fn groups(&self) -> &[TagGroup] {
        self.groups.as_deref().unwrap_or(&[])
    }

    /// Number of fetches that have filled the cache so far.
    pub fn fetches(&self) -> u64 {
        self.fetches
    }

    pub fn replace(&mut self, envelope: TagGroupsEnvelope) {
        let groups: Vec<TagGroup> = envelope.tag_groups.into_iter().map(TagGroup::from).collect();
        debug!(
            groups = groups.len(),
            tags = groups.iter().map(|g| g.tags.len()).sum::<usize>(),
            "replacing tag group cache"
        );
        self.groups = Some(groups);
        self.fetches += 1;
    }

    pub fn invalidate(&mut self) {
        debug!("invalidating tag group cache");
        self.groups = None;
    }

    pub fn contains(&self, name: &str) -> bool {
        self.groups()
            .iter()
            .any(|group| group.tags.iter().any(|tag| tag.name == name))
    }

    /// Every cached tag name, group by group, in cache order.
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.groups()
            .iter()
            .flat_map(|group| group.tags.iter().map(|tag| tag.name.as_str()))
    }
}
