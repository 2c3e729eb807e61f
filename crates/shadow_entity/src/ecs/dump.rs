//! # Storage Dump
//!
//! A snapshot of everything the storage core holds, for inspectors and
//! debugging. Built by [`StorageManager::dump`](super::StorageManager::dump).

use std::fmt;

use super::archetype::ArchetypeId;
use super::manager::Record;
use super::node::Uuid;

/// One pool per node type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolSummary {
    /// Display name of the node type.
    pub type_name: String,
    /// Chunks created so far.
    pub chunks: usize,
    /// Live slots.
    pub live: usize,
}

/// One archetype.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchetypeSummary {
    /// Archetype id.
    pub id: ArchetypeId,
    /// Display names of the shape, in canonical order.
    pub shape: Vec<String>,
    /// Number of rows.
    pub rows: usize,
}

/// Full snapshot of a [`StorageManager`](super::StorageManager).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageDump {
    /// Pools, ordered by type id.
    pub pools: Vec<PoolSummary>,
    /// Archetypes, ordered by id. Empty archetypes are included.
    pub archetypes: Vec<ArchetypeSummary>,
    /// Location of every row-owning node, ordered by uuid.
    pub records: Vec<(Uuid, Record)>,
}

impl StorageDump {
    /// Finds the archetype whose shape names are exactly `shape`, in any
    /// order.
    #[must_use]
    pub fn archetype_by_shape(&self, shape: &[&str]) -> Option<&ArchetypeSummary> {
        let mut wanted: Vec<&str> = shape.to_vec();
        wanted.sort_unstable();
        self.archetypes.iter().find(|a| {
            let mut names: Vec<&str> = a.shape.iter().map(String::as_str).collect();
            names.sort_unstable();
            names == wanted
        })
    }
}

impl fmt::Display for StorageDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pools:")?;
        for pool in &self.pools {
            writeln!(
                f,
                "  {}: {} chunk(s), {} live",
                pool.type_name, pool.chunks, pool.live
            )?;
        }

        writeln!(f, "archetypes:")?;
        for archetype in &self.archetypes {
            writeln!(
                f,
                "  {} {{{}}}: {} row(s)",
                archetype.id,
                archetype.shape.join(", "),
                archetype.rows
            )?;
        }

        writeln!(f, "records:")?;
        for (uuid, record) in &self.records {
            writeln!(f, "  {uuid} -> {}[{}]", record.archetype, record.row)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_every_section() {
        let dump = StorageDump {
            pools: vec![PoolSummary {
                type_name: "Scene".into(),
                chunks: 1,
                live: 1,
            }],
            archetypes: vec![ArchetypeSummary {
                id: ArchetypeId::new(0),
                shape: vec!["Scene".into()],
                rows: 1,
            }],
            records: vec![(
                Uuid::new(1),
                Record {
                    archetype: ArchetypeId::new(0),
                    row: 0,
                },
            )],
        };

        let text = dump.to_string();
        assert_eq!(
            text,
            "pools:\n  Scene: 1 chunk(s), 1 live\n\
             archetypes:\n  A0 {Scene}: 1 row(s)\n\
             records:\n  #1 -> A0[0]\n"
        );
        assert!(dump.archetype_by_shape(&["Scene"]).is_some());
        assert!(dump.archetype_by_shape(&["Player"]).is_none());
    }
}
