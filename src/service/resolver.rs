//! Company universe resolution
//!
//! Turns a company selector (explicit entity IDs or a watchlist reference)
//! into a deduplicated, company-only list of entities.

use std::collections::HashSet;

use crate::model::CompanySelector;
use crate::service::knowledge_graph::{Entity, KnowledgeGraph, KnowledgeGraphError};

#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("No companies found in the provided universe or watchlist")]
    NoCompanies,

    #[error(transparent)]
    KnowledgeGraph(#[from] KnowledgeGraphError),
}

/// Resolve the selector to a list of company entities
///
/// Watchlist references are expanded to their member IDs first, then all IDs
/// are resolved in one batched call. Non-company entities and unresolvable
/// IDs are dropped; duplicates keep the first occurrence. An empty result is
/// an error: an analysis without companies is meaningless.
pub async fn resolve_companies(
    selector: &CompanySelector,
    knowledge_graph: &dyn KnowledgeGraph,
) -> Result<Vec<Entity>, ResolutionError> {
    let ids = match selector {
        CompanySelector::Universe(ids) => ids.clone(),
        CompanySelector::Watchlist(watchlist_id) => {
            let watchlist = knowledge_graph.get_watchlist(watchlist_id).await?;
            tracing::debug!(
                watchlist_id = %watchlist.id,
                members = watchlist.items.len(),
                "Expanded watchlist to member IDs"
            );
            watchlist.items
        }
    };

    if ids.is_empty() {
        return Err(ResolutionError::NoCompanies);
    }

    let entities = knowledge_graph.get_entities(&ids).await?;

    let mut seen = HashSet::new();
    let companies: Vec<Entity> = entities
        .into_iter()
        .flatten()
        .filter(|entity| entity.is_company())
        .filter(|entity| seen.insert(entity.id.clone()))
        .collect();

    if companies.is_empty() {
        return Err(ResolutionError::NoCompanies);
    }

    tracing::info!(companies = companies.len(), "Resolved company universe");

    Ok(companies)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::service::knowledge_graph::Watchlist;

    struct StubGraph {
        entities: Vec<Option<Entity>>,
        watchlist_items: Vec<String>,
    }

    #[async_trait]
    impl KnowledgeGraph for StubGraph {
        async fn get_entities(
            &self,
            _ids: &[String],
        ) -> Result<Vec<Option<Entity>>, KnowledgeGraphError> {
            Ok(self.entities.clone())
        }

        async fn get_watchlist(&self, id: &str) -> Result<Watchlist, KnowledgeGraphError> {
            Ok(Watchlist {
                id: id.to_string(),
                name: Some("Test list".to_string()),
                items: self.watchlist_items.clone(),
            })
        }
    }

    fn company(id: &str, name: &str) -> Entity {
        Entity {
            id: id.to_string(),
            name: name.to_string(),
            entity_type: Entity::TYPE_COMPANY.to_string(),
            ticker: None,
            sector: None,
            industry: None,
            country: None,
        }
    }

    fn place(id: &str, name: &str) -> Entity {
        Entity {
            entity_type: "PLCE".to_string(),
            ..company(id, name)
        }
    }

    #[tokio::test]
    async fn test_filters_and_dedups() {
        let graph = StubGraph {
            entities: vec![
                Some(company("C1", "Acme")),
                Some(place("P1", "China")),
                None,
                Some(company("C1", "Acme again")),
                Some(company("C2", "Globex")),
            ],
            watchlist_items: vec![],
        };
        let selector = CompanySelector::Universe(vec!["C1".into(), "C2".into()]);

        let companies = resolve_companies(&selector, &graph).await.unwrap();

        assert_eq!(companies.len(), 2);
        assert_eq!(companies[0].id, "C1");
        assert_eq!(companies[0].name, "Acme");
        assert_eq!(companies[1].id, "C2");
    }

    #[tokio::test]
    async fn test_empty_resolution_fails() {
        let graph = StubGraph {
            entities: vec![None, Some(place("P1", "China"))],
            watchlist_items: vec![],
        };
        let selector = CompanySelector::Universe(vec!["X".into()]);

        let err = resolve_companies(&selector, &graph).await.unwrap_err();
        assert!(matches!(err, ResolutionError::NoCompanies));
    }

    #[tokio::test]
    async fn test_watchlist_expansion() {
        let graph = StubGraph {
            entities: vec![Some(company("C9", "Initech"))],
            watchlist_items: vec!["C9".to_string()],
        };
        let selector = CompanySelector::Watchlist("w-1".to_string());

        let companies = resolve_companies(&selector, &graph).await.unwrap();
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].id, "C9");
    }

    #[tokio::test]
    async fn test_empty_watchlist_fails() {
        let graph = StubGraph {
            entities: vec![],
            watchlist_items: vec![],
        };
        let selector = CompanySelector::Watchlist("w-empty".to_string());

        let err = resolve_companies(&selector, &graph).await.unwrap_err();
        assert!(matches!(err, ResolutionError::NoCompanies));
    }
}
