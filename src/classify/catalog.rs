use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::{ProductCategory, ProductClassifier};

/// Host metadata for one item definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
}

/// Read access to the host's live item catalog.
pub trait ItemCatalog: Send + Sync {
    fn find(&self, item_id: &str) -> Option<ItemDefinition>;
}

/// Catalog held in memory, refreshed by whoever owns it.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    items: RwLock<HashMap<String, ItemDefinition>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(definitions: impl IntoIterator<Item = ItemDefinition>) -> Self {
        let catalog = Self::new();
        for definition in definitions {
            catalog.upsert(definition);
        }
        catalog
    }

    pub fn upsert(&self, definition: ItemDefinition) {
        self.items.write().insert(definition.id.clone(), definition);
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl ItemCatalog for InMemoryCatalog {
    fn find(&self, item_id: &str) -> Option<ItemDefinition> {
        self.items.read().get(item_id).cloned()
    }
}

/// Resolves the identifier in the catalog, then matches the definition's
/// name (substring, case-insensitive) or its tag set against each category name.
pub struct CatalogClassifier {
    catalog: Arc<dyn ItemCatalog>,
}

impl CatalogClassifier {
    pub fn new(catalog: Arc<dyn ItemCatalog>) -> Self {
        Self { catalog }
    }

    fn category_of(definition: &ItemDefinition) -> ProductCategory {
        let name = definition.name.to_lowercase();
        ProductCategory::MATCHABLE
            .into_iter()
            .find(|category| {
                let key = category.as_str();
                name.contains(key) || definition.tags.iter().any(|tag| tag == key)
            })
            .unwrap_or(ProductCategory::Unknown)
    }
}

impl ProductClassifier for CatalogClassifier {
    fn classify(&self, identifier: &str) -> ProductCategory {
        match self.catalog.find(identifier) {
            Some(definition) => Self::category_of(&definition),
            None => ProductCategory::Unknown,
        }
    }
}
