//! Projection strategy selection

use crate::graph::rel;
use crate::schema::{GraphRole, GraphSchemaDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Which concept-similarity graph feeds the advanced metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectionStrategy {
    /// Explicit RELATES_TO relationships, as directed edges
    RelatesTo,
    /// Concepts linked by shared taxonomy parents
    CoTaxonomy,
    /// Concepts linked by appearing in the same Source
    CoCitation,
}

impl ProjectionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RelatesTo => "RELATES_TO",
            Self::CoTaxonomy => "CO_TAXONOMY",
            Self::CoCitation => "CO_CITATION",
        }
    }

    /// Relationship types the projection is built from
    pub fn backing_types(&self) -> &'static [&'static str] {
        match self {
            Self::RelatesTo => &[rel::RELATES_TO],
            Self::CoTaxonomy => &rel::TAXONOMY,
            Self::CoCitation => &[rel::MENTIONS, rel::FROM_SOURCE],
        }
    }
}

impl std::fmt::Display for ProjectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the projection. First match wins:
/// any CHAIN field, then CODE plus taxonomy fields, then co-citation.
///
/// The choice depends on the schema alone. `committed` only feeds a
/// diagnostic when the chosen strategy has nothing to project.
pub fn select_strategy(schema: &GraphSchemaDescriptor, committed: &BTreeSet<String>) -> ProjectionStrategy {
    let strategy = if schema.has_role(GraphRole::ExplicitRelationship) {
        ProjectionStrategy::RelatesTo
    } else if schema.has_role(GraphRole::ConceptNode) && schema.has_role(GraphRole::TaxonomyNode) {
        ProjectionStrategy::CoTaxonomy
    } else {
        ProjectionStrategy::CoCitation
    };

    let missing: Vec<&str> = strategy
        .backing_types()
        .iter()
        .copied()
        .filter(|t| !committed.contains(*t))
        .collect();
    if !missing.is_empty() {
        debug!(%strategy, ?missing, "strategy's relationship types are not in the committed graph");
    }

    strategy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{resolve, FieldDeclaration, FieldKind, Template};

    fn schema(kinds: &[FieldKind]) -> GraphSchemaDescriptor {
        let fields = kinds
            .iter()
            .enumerate()
            .map(|(i, k)| FieldDeclaration::new(format!("{}_{i}", k.to_string().to_lowercase()), *k))
            .collect();
        resolve(&Template::new(fields)).unwrap()
    }

    fn committed(types: &[&str]) -> BTreeSet<String> {
        types.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn chain_always_selects_relates_to() {
        use FieldKind::*;
        for kinds in [
            vec![Chain],
            vec![Code, Chain],
            vec![Code, Topic, Aspect, Chain],
            vec![Topic, Dimension, Chain, Text],
        ] {
            assert_eq!(
                select_strategy(&schema(&kinds), &committed(&["GROUPED_BY", "MENTIONS"])),
                ProjectionStrategy::RelatesTo,
                "{kinds:?}"
            );
        }
    }

    #[test]
    fn code_with_taxonomy_selects_co_taxonomy() {
        use FieldKind::*;
        for kinds in [vec![Code, Topic], vec![Code, Aspect, Memo], vec![Dimension, Code]] {
            assert_eq!(
                select_strategy(&schema(&kinds), &BTreeSet::new()),
                ProjectionStrategy::CoTaxonomy,
                "{kinds:?}"
            );
        }
    }

    #[test]
    fn everything_else_falls_back_to_co_citation() {
        use FieldKind::*;
        for kinds in [vec![], vec![Code], vec![Topic, Aspect], vec![Text, Enumerated]] {
            assert_eq!(
                select_strategy(&schema(&kinds), &committed(&["RELATES_TO"])),
                ProjectionStrategy::CoCitation,
                "{kinds:?}"
            );
        }
    }

    #[test]
    fn strategy_names_match_wire_format() {
        let json = serde_json::to_string(&ProjectionStrategy::CoTaxonomy).unwrap();
        assert_eq!(json, "\"CO_TAXONOMY\"");
        assert_eq!(ProjectionStrategy::CoCitation.to_string(), "CO_CITATION");
    }
}
