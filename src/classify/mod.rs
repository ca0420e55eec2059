//! Product classification.
//!
//! Maps an item identifier to a coarse semantic category. Two strategies exist:
//! fixed keyword matching on the identifier itself, and lookup into a live
//! item catalog supplied by the host. Both sit behind `ProductClassifier`.

pub mod catalog;
pub mod keyword;

pub use catalog::{CatalogClassifier, InMemoryCatalog, ItemCatalog, ItemDefinition};
pub use keyword::KeywordClassifier;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::config::{ClassifierConfig, ClassifierStrategy};

/// Declared order is match priority: the first category that matches wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductCategory {
    Weed,
    Meth,
    Cocaine,
    Unknown,
}

impl ProductCategory {
    pub const MATCHABLE: [ProductCategory; 3] = [
        ProductCategory::Weed,
        ProductCategory::Meth,
        ProductCategory::Cocaine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Weed => "weed",
            ProductCategory::Meth => "meth",
            ProductCategory::Cocaine => "cocaine",
            ProductCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier -> category. A miss is `Unknown`, never an error.
pub trait ProductClassifier: Send + Sync {
    fn classify(&self, identifier: &str) -> ProductCategory;
}

impl<T: ProductClassifier + ?Sized> ProductClassifier for Arc<T> {
    fn classify(&self, identifier: &str) -> ProductCategory {
        (**self).classify(identifier)
    }
}

/// Picks the configured strategy. Catalog mode without a catalog degrades to keywords.
pub fn build_classifier(
    config: &ClassifierConfig,
    catalog: Option<Arc<dyn ItemCatalog>>,
) -> Box<dyn ProductClassifier> {
    match (config.strategy, catalog) {
        (ClassifierStrategy::Keyword, _) => Box::new(KeywordClassifier::from_config(config)),
        (ClassifierStrategy::Catalog, Some(catalog)) => Box::new(CatalogClassifier::new(catalog)),
        (ClassifierStrategy::Catalog, None) => {
            warn!("Catalog classification requested but no item catalog was supplied, using keywords");
            Box::new(KeywordClassifier::from_config(config))
        }
    }
}
