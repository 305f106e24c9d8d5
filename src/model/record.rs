//! Concrete JSON-lines records and an in-memory corpus.
//!
//! One record per line: `{"id": ..., "schema": ..., "properties": {...}}`
//! with property values as string arrays. Property names map onto semantic
//! types through a fixed table; unknown properties are treated as free text.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::{CanonResult, ModelError};
use crate::model::{Corpus, EntityLike, PropType};

/// Schema definition: matchable flag plus the schemata it may match.
struct SchemaDef {
    matchable: bool,
    compatible: &'static [&'static str],
}

static SCHEMATA: LazyLock<HashMap<&'static str, SchemaDef>> = LazyLock::new(|| {
    HashMap::from([
        (
            "Person",
            SchemaDef {
                matchable: true,
                compatible: &["Person"],
            },
        ),
        (
            "Company",
            SchemaDef {
                matchable: true,
                compatible: &["Company", "Organization"],
            },
        ),
        (
            "Organization",
            SchemaDef {
                matchable: true,
                compatible: &["Organization", "Company"],
            },
        ),
        (
            "Asset",
            SchemaDef {
                matchable: true,
                compatible: &["Asset"],
            },
        ),
        // Addresses hang off other entities; they are never matched directly.
        (
            "Address",
            SchemaDef {
                matchable: false,
                compatible: &[],
            },
        ),
    ])
});

static PROP_TYPES: LazyLock<HashMap<&'static str, PropType>> = LazyLock::new(|| {
    HashMap::from([
        ("name", PropType::Name),
        ("alias", PropType::Name),
        ("previousName", PropType::Name),
        ("birthDate", PropType::Date),
        ("deathDate", PropType::Date),
        ("incorporationDate", PropType::Date),
        ("dissolutionDate", PropType::Date),
        ("country", PropType::Country),
        ("jurisdiction", PropType::Country),
        ("nationality", PropType::Country),
        ("phone", PropType::Phone),
        ("email", PropType::Email),
        ("address", PropType::Address),
        ("registrationNumber", PropType::Identifier),
        ("idNumber", PropType::Identifier),
        ("passportNumber", PropType::Identifier),
        ("taxNumber", PropType::Identifier),
        ("sameAs", PropType::Identifier),
        ("notes", PropType::Text),
        ("owner", PropType::Entity),
        ("parent", PropType::Entity),
        ("subsidiary", PropType::Entity),
        ("associate", PropType::Entity),
        ("addressEntity", PropType::Entity),
    ])
});

/// Semantic type of a property name; unknown names are free text.
pub fn prop_type(name: &str) -> PropType {
    PROP_TYPES.get(name).copied().unwrap_or(PropType::Text)
}

/// Whether the named schema participates in matching.
pub fn schema_matchable(schema: &str) -> bool {
    SCHEMATA.get(schema).is_some_and(|def| def.matchable)
}

/// Whether entities of the two schemata may be matched against each other.
pub fn schemata_compatible(schema: &str, other: &str) -> bool {
    SCHEMATA
        .get(schema)
        .is_some_and(|def| def.matchable && def.compatible.contains(&other))
}

/// A single corpus record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub schema: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Vec<String>>,
}

impl Record {
    pub fn new(id: impl Into<String>, schema: impl Into<String>) -> Self {
        Record {
            id: id.into(),
            schema: schema.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property append.
    pub fn with(mut self, prop: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties
            .entry(prop.into())
            .or_default()
            .push(value.into());
        self
    }
}

impl EntityLike for Record {
    fn id(&self) -> &str {
        &self.id
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    fn matchable(&self) -> bool {
        schema_matchable(&self.schema)
    }

    fn can_match(&self, other_schema: &str) -> bool {
        schemata_compatible(&self.schema, other_schema)
    }

    fn typed_values(&self) -> Vec<(PropType, &str)> {
        let mut values = Vec::new();
        for (prop, vals) in &self.properties {
            let ptype = prop_type(prop);
            if ptype == PropType::Entity {
                continue;
            }
            for value in vals {
                values.push((ptype, value.as_str()));
            }
        }
        values
    }

    fn entity_refs(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        for (prop, vals) in &self.properties {
            if prop_type(prop) == PropType::Entity {
                refs.extend(vals.iter().map(String::as_str));
            }
        }
        refs
    }
}

/// An in-memory corpus with a precomputed two-way adjacency map.
#[derive(Debug, Default)]
pub struct MemoryCorpus {
    records: Vec<Record>,
    by_id: HashMap<String, usize>,
    /// id → indices of adjacent records (outgoing references and inbound
    /// referers alike).
    adjacency: HashMap<String, Vec<usize>>,
}

impl MemoryCorpus {
    pub fn new() -> Self {
        MemoryCorpus::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = Record>) -> CanonResult<Self> {
        let mut corpus = MemoryCorpus::new();
        for record in records {
            corpus.add(record)?;
        }
        corpus.link();
        Ok(corpus)
    }

    /// Load a JSON-lines corpus file.
    pub fn load(path: &Path) -> CanonResult<Self> {
        let file = File::open(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut corpus = MemoryCorpus::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| ModelError::Io {
                path: path.display().to_string(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Record =
                serde_json::from_str(&line).map_err(|source| ModelError::InvalidRecord {
                    path: path.display().to_string(),
                    line: idx + 1,
                    source,
                })?;
            corpus.add(record)?;
        }
        corpus.link();
        tracing::info!(entities = corpus.len(), path = %path.display(), "loaded corpus");
        Ok(corpus)
    }

    fn add(&mut self, record: Record) -> CanonResult<()> {
        if !SCHEMATA.contains_key(record.schema.as_str()) {
            return Err(ModelError::UnknownSchema {
                name: record.schema.clone(),
            }
            .into());
        }
        // Later records replace earlier ones with the same id.
        if let Some(&idx) = self.by_id.get(&record.id) {
            self.records[idx] = record;
            return Ok(());
        }
        self.by_id.insert(record.id.clone(), self.records.len());
        self.records.push(record);
        Ok(())
    }

    /// Rebuild the two-way adjacency map from entity references.
    fn link(&mut self) {
        let mut adjacency: HashMap<String, HashSet<usize>> = HashMap::new();
        for (idx, record) in self.records.iter().enumerate() {
            for referenced in record.entity_refs() {
                if let Some(&target_idx) = self.by_id.get(referenced) {
                    adjacency
                        .entry(record.id.clone())
                        .or_default()
                        .insert(target_idx);
                    adjacency
                        .entry(referenced.to_string())
                        .or_default()
                        .insert(idx);
                }
            }
        }
        self.adjacency = adjacency
            .into_iter()
            .map(|(id, set)| {
                let mut indices: Vec<usize> = set.into_iter().collect();
                indices.sort_unstable();
                (id, indices)
            })
            .collect();
    }
}

impl Corpus for MemoryCorpus {
    type Entity = Record;

    fn entities(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    fn get(&self, id: &str) -> Option<&Record> {
        self.by_id.get(id).map(|&idx| &self.records[idx])
    }

    fn adjacent(&self, id: &str) -> Vec<&Record> {
        self.adjacency
            .get(id)
            .map(|indices| indices.iter().map(|&idx| &self.records[idx]).collect())
            .unwrap_or_default()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(id: &str, name: &str) -> Record {
        Record::new(id, "Person").with("name", name)
    }

    #[test]
    fn schema_table() {
        assert!(schema_matchable("Person"));
        assert!(!schema_matchable("Address"));
        assert!(!schema_matchable("Vessel"));
        assert!(schemata_compatible("Company", "Organization"));
        assert!(schemata_compatible("Person", "Person"));
        assert!(!schemata_compatible("Person", "Company"));
        assert!(!schemata_compatible("Address", "Address"));
    }

    #[test]
    fn typed_values_skip_entity_refs() {
        let record = Record::new("c1", "Company")
            .with("name", "Acme Inc")
            .with("owner", "p1");
        let values = record.typed_values();
        assert_eq!(values, vec![(PropType::Name, "Acme Inc")]);
        assert_eq!(record.entity_refs(), vec!["p1"]);
    }

    #[test]
    fn unknown_props_are_text() {
        assert_eq!(prop_type("website"), PropType::Text);
        assert_eq!(prop_type("birthDate"), PropType::Date);
    }

    #[test]
    fn corpus_adjacency_is_two_way() {
        let corpus = MemoryCorpus::from_records([
            person("p1", "John Doe"),
            Record::new("c1", "Company")
                .with("name", "Acme Inc")
                .with("owner", "p1"),
        ])
        .unwrap();
        let from_company: Vec<&str> = corpus.adjacent("c1").iter().map(|r| r.id()).collect();
        assert_eq!(from_company, vec!["p1"]);
        let from_person: Vec<&str> = corpus.adjacent("p1").iter().map(|r| r.id()).collect();
        assert_eq!(from_person, vec!["c1"]);
    }

    #[test]
    fn unknown_schema_is_rejected() {
        let result = MemoryCorpus::from_records([Record::new("x", "Spaceship")]);
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_ids_last_write_wins() {
        let corpus = MemoryCorpus::from_records([
            person("p1", "John Doe"),
            person("p1", "Jon Doe"),
        ])
        .unwrap();
        assert_eq!(corpus.len(), 1);
        let record = corpus.get("p1").unwrap();
        assert_eq!(record.properties["name"], vec!["Jon Doe"]);
    }
}
