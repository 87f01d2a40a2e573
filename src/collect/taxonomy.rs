//! Remote-to-local category binding and the local category tree.

use std::collections::HashMap;

use crate::collect::decode::RemoteCategory;
use crate::collect::error::CollectResult;
use crate::collect::store::CategoryDirectory;
use crate::domain::SourceId;

/// Key of one binding: `"<sourceId>_<remoteCategoryId>"`.
#[must_use]
pub fn binding_key(source: SourceId, remote_category: &str) -> String {
    format!("{source}_{}", remote_category.trim())
}

/// Binding table snapshot taken at run start.
#[derive(Debug, Clone, Default)]
pub struct Binder {
    table: HashMap<String, i32>,
}

impl Binder {
    #[must_use]
    pub const fn new(table: HashMap<String, i32>) -> Self {
        Self { table }
    }

    pub async fn load(directory: &dyn CategoryDirectory) -> CollectResult<Self> {
        Ok(Self::new(directory.bindings().await?))
    }

    /// Local category for a remote one; 0 when unbound.
    #[must_use]
    pub fn bind(&self, source: SourceId, remote_category: &str) -> i32 {
        if remote_category.trim().is_empty() {
            return 0;
        }
        self.table
            .get(&binding_key(source, remote_category))
            .copied()
            .unwrap_or(0)
    }

    /// Pairs each remote category with its current binding, for display.
    #[must_use]
    pub fn describe<'a>(
        &self,
        source: SourceId,
        remote: &'a [RemoteCategory],
    ) -> Vec<(&'a RemoteCategory, i32)> {
        remote.iter().map(|c| (c, self.bind(source, &c.id))).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Parent lookup over local categories.
#[derive(Debug, Clone, Default)]
pub struct CategoryTree {
    parents: HashMap<i32, i32>,
}

impl CategoryTree {
    #[must_use]
    pub const fn new(parents: HashMap<i32, i32>) -> Self {
        Self { parents }
    }

    pub async fn load(directory: &dyn CategoryDirectory) -> CollectResult<Self> {
        Ok(Self::new(directory.parents().await?))
    }

    /// Parent of a local category; 0 for top-level or unknown categories.
    #[must_use]
    pub fn parent(&self, category_id: i32) -> i32 {
        self.parents.get(&category_id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binder() -> Binder {
        let mut table = HashMap::new();
        table.insert("1_6".to_string(), 20);
        table.insert("2_6".to_string(), 31);
        Binder::new(table)
    }

    #[test]
    fn test_bind_is_scoped_per_source() {
        let binder = binder();
        assert_eq!(binder.bind(SourceId::new(1), "6"), 20);
        assert_eq!(binder.bind(SourceId::new(2), " 6 "), 31);
        assert_eq!(binder.bind(SourceId::new(3), "6"), 0);
    }

    #[test]
    fn test_unbound_and_blank_categories_are_zero() {
        let binder = binder();
        assert_eq!(binder.bind(SourceId::new(1), "7"), 0);
        assert_eq!(binder.bind(SourceId::new(1), ""), 0);
    }

    #[test]
    fn test_category_tree_parent_defaults_to_zero() {
        let tree = CategoryTree::new(HashMap::from([(20, 1)]));
        assert_eq!(tree.parent(20), 1);
        assert_eq!(tree.parent(99), 0);
    }
}
