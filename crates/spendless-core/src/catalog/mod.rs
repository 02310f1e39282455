//! Challenge template catalog.
//!
//! The catalog is read-only from the engine's point of view. Templates are
//! validated when the catalog is built, so a template that reaches the
//! engine always carries well-formed rule parameters.

mod file;
mod seed;

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;

use crate::error::CatalogError;
use crate::model::ChallengeTemplate;

/// Source of challenge templates.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn template(&self, id: &str) -> Result<Option<ChallengeTemplate>, CatalogError>;

    async fn templates(&self) -> Result<Vec<ChallengeTemplate>, CatalogError>;
}

/// In-memory catalog built from the seed set or a TOML file.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    templates: BTreeMap<String, ChallengeTemplate>,
}

impl StaticCatalog {
    /// Build a catalog, validating every template and rejecting duplicate ids.
    pub fn new(templates: Vec<ChallengeTemplate>) -> Result<Self, CatalogError> {
        let mut map = BTreeMap::new();
        for template in templates {
            template.validate()?;
            if map.contains_key(&template.id) {
                return Err(CatalogError::DuplicateId(template.id));
            }
            map.insert(template.id.clone(), template);
        }
        Ok(Self { templates: map })
    }

    /// The built-in challenge set.
    pub fn seeded() -> Self {
        let templates = seed::templates()
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();
        Self { templates }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        Self::new(file::parse(content)?)
    }

    /// Load templates from a TOML file with a `[[templates]]` array.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), count = catalog.len(), "loaded challenge templates");
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn template(&self, id: &str) -> Result<Option<ChallengeTemplate>, CatalogError> {
        Ok(self.templates.get(id).cloned())
    }

    async fn templates(&self) -> Result<Vec<ChallengeTemplate>, CatalogError> {
        Ok(self.templates.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_templates_are_valid() {
        let catalog = StaticCatalog::seeded();
        assert!(!catalog.is_empty());
        for template in catalog.templates.values() {
            template.validate().unwrap();
        }
        // Re-validating through the checked constructor must succeed too.
        StaticCatalog::new(catalog.templates.into_values().collect()).unwrap();
    }

    #[tokio::test]
    async fn lookup_by_id() {
        let catalog = StaticCatalog::seeded();
        let template = catalog.template("no-fast-food-7d").await.unwrap().unwrap();
        assert_eq!(template.duration_days, 7);
        assert!(catalog.template("missing").await.unwrap().is_none());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut templates = seed::templates();
        templates.push(templates[0].clone());
        let err = StaticCatalog::new(templates).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId(_)));
    }
}
