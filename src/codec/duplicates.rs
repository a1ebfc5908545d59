//! Duplicate detection in grouped key/value tables. Two rows are duplicates when they share
//! both the group and the key cell; a missing cell matches another missing cell.
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use crate::{codec::table::RawTable, error::AssetTreeError};

/// What to keep of each set of duplicated rows. Rows that are not duplicated are always kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateStrategy {
    KeepFirst,
    KeepLast,
    RemoveAll,
    /// Keep exactly these data rows (0-based, header excluded) among the duplicates.
    UserSpecific(BTreeSet<usize>),
}

impl FromStr for DuplicateStrategy {
    type Err = AssetTreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "keep-first" | "first" => Ok(DuplicateStrategy::KeepFirst),
            "keep-last" | "last" => Ok(DuplicateStrategy::KeepLast),
            "remove-all" | "none" => Ok(DuplicateStrategy::RemoveAll),
            other => Err(AssetTreeError::Validation(format!(
                "Unknown duplicate strategy '{other}' (expected keep-first, keep-last or remove-all)"
            ))),
        }
    }
}

impl fmt::Display for DuplicateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateStrategy::KeepFirst => write!(f, "keep-first"),
            DuplicateStrategy::KeepLast => write!(f, "keep-last"),
            DuplicateStrategy::RemoveAll => write!(f, "remove-all"),
            DuplicateStrategy::UserSpecific(rows) => write!(f, "keep rows {rows:?}"),
        }
    }
}

/// Rows sharing one (group, key) pair, in table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub group: Option<String>,
    pub key: Option<String>,
    pub rows: Vec<usize>,
}

impl fmt::Display for DuplicateGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines = self
            .rows
            .iter()
            .map(|r| (r + 2).to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "group '{}', key '{}': CSV rows {}",
            self.group.as_deref().unwrap_or_default(),
            self.key.as_deref().unwrap_or_default(),
            lines
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateResolver {
    pub group_column: String,
    pub key_column: String,
}

impl DuplicateResolver {
    pub fn new<S: Into<String>>(group_column: S, key_column: S) -> Self {
        DuplicateResolver {
            group_column: group_column.into(),
            key_column: key_column.into(),
        }
    }

    fn require(&self, table: &RawTable, column: &str) -> Result<usize, AssetTreeError> {
        table.column(column).ok_or_else(|| {
            AssetTreeError::Validation(format!("Duplicate check has no '{column}' column"))
        })
    }

    /// Every (group, key) pair held by more than one row, ordered by first occurrence.
    pub fn find(&self, table: &RawTable) -> Result<Vec<DuplicateGroup>, AssetTreeError> {
        let group = self.require(table, &self.group_column)?;
        let key = self.require(table, &self.key_column)?;

        let mut seen: BTreeMap<(Option<&str>, Option<&str>), Vec<usize>> = BTreeMap::new();
        for row in 0..table.len() {
            seen.entry((table.cell(row, group), table.cell(row, key)))
                .or_default()
                .push(row);
        }
        let mut duplicates = seen
            .into_iter()
            .filter(|(_, rows)| rows.len() > 1)
            .map(|((g, k), rows)| DuplicateGroup {
                group: g.map(|g| g.to_string()),
                key: k.map(|k| k.to_string()),
                rows,
            })
            .collect::<Vec<_>>();
        duplicates.sort_by_key(|d| d.rows[0]);
        Ok(duplicates)
    }

    /// A copy of `table` with the duplicates `strategy` does not keep removed.
    pub fn resolve(
        &self,
        table: &RawTable,
        strategy: &DuplicateStrategy,
    ) -> Result<RawTable, AssetTreeError> {
        let duplicates = self.find(table)?;
        if duplicates.is_empty() {
            tracing::debug!("[duplicates] none found");
            return Ok(table.clone());
        }

        let mut dropped = BTreeSet::new();
        for duplicate in duplicates.iter() {
            tracing::info!("[duplicates] {} resolved with {}", duplicate, strategy);
            let rows = &duplicate.rows;
            match strategy {
                DuplicateStrategy::KeepFirst => dropped.extend(rows[1..].iter().copied()),
                DuplicateStrategy::KeepLast => {
                    dropped.extend(rows[..rows.len() - 1].iter().copied())
                }
                DuplicateStrategy::RemoveAll => dropped.extend(rows.iter().copied()),
                DuplicateStrategy::UserSpecific(keep) => {
                    dropped.extend(rows.iter().copied().filter(|r| !keep.contains(r)))
                }
            }
        }
        if let DuplicateStrategy::UserSpecific(keep) = strategy {
            for row in keep.iter() {
                if !duplicates.iter().any(|d| d.rows.contains(row)) {
                    tracing::warn!("[duplicates] CSV row {} is not a duplicate", row + 2);
                }
            }
        }

        let rows = table
            .rows
            .iter()
            .enumerate()
            .filter(|(idx, _)| !dropped.contains(idx))
            .map(|(_, row)| row.clone())
            .collect::<Vec<_>>();
        tracing::info!(
            "[duplicates] removed {} of {} rows",
            dropped.len(),
            table.len()
        );
        Ok(RawTable {
            headers: table.headers.clone(),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Rows 0 and 2 share (Pump House, 1); rows 3 and 5 share (Boiler, missing key)
    fn source() -> RawTable {
        RawTable::from_bytes(
            b"Unit,Code,Meaning\n\
              Pump House,1,Running\n\
              Pump House,2,Stopped\n\
              Pump House,1,Started\n\
              Boiler,,Off\n\
              Boiler,A,Auto\n\
              Boiler,,Idle\n",
        )
        .unwrap()
    }

    fn meanings(table: &RawTable) -> Vec<&str> {
        let column = table.column("Meaning").unwrap();
        (0..table.len())
            .map(|row| table.cell(row, column).unwrap())
            .collect()
    }

    fn resolver() -> DuplicateResolver {
        DuplicateResolver::new("Unit", "Code")
    }

    #[test]
    fn finds_duplicated_group_key_pairs() {
        let found = resolver().find(&source()).unwrap();
        assert_eq!(
            found,
            vec![
                DuplicateGroup {
                    group: Some("Pump House".to_string()),
                    key: Some("1".to_string()),
                    rows: vec![0, 2],
                },
                DuplicateGroup {
                    group: Some("Boiler".to_string()),
                    key: None,
                    rows: vec![3, 5],
                },
            ]
        );
        assert_eq!(
            found[0].to_string(),
            "group 'Pump House', key '1': CSV rows 2, 4"
        );
        assert!(DuplicateResolver::new("Unit", "Missing")
            .find(&source())
            .is_err());
    }

    #[test]
    fn keep_first() {
        let resolved = resolver()
            .resolve(&source(), &DuplicateStrategy::KeepFirst)
            .unwrap();
        assert_eq!(meanings(&resolved), vec!["Running", "Stopped", "Off", "Auto"]);
    }

    #[test]
    fn keep_last() {
        let resolved = resolver()
            .resolve(&source(), &DuplicateStrategy::KeepLast)
            .unwrap();
        assert_eq!(meanings(&resolved), vec!["Stopped", "Started", "Auto", "Idle"]);
    }

    #[test]
    fn remove_all() {
        let resolved = resolver()
            .resolve(&source(), &DuplicateStrategy::RemoveAll)
            .unwrap();
        assert_eq!(meanings(&resolved), vec!["Stopped", "Auto"]);
        assert_eq!(resolved.headers, source().headers);
    }

    #[test]
    fn user_specific_keeps_chosen_rows() {
        let strategy = DuplicateStrategy::UserSpecific(BTreeSet::from([2, 3, 5]));
        let resolved = resolver().resolve(&source(), &strategy).unwrap();
        assert_eq!(
            meanings(&resolved),
            vec!["Stopped", "Started", "Off", "Auto", "Idle"]
        );

        // Listing nothing drops every duplicate
        let resolved = resolver()
            .resolve(&source(), &DuplicateStrategy::UserSpecific(BTreeSet::new()))
            .unwrap();
        assert_eq!(meanings(&resolved), vec!["Stopped", "Auto"]);
    }

    #[test]
    fn table_without_duplicates_is_unchanged() {
        let table = RawTable::from_bytes(b"Unit,Code,Meaning\nPress,1,On\nPress,2,Off\n").unwrap();
        assert!(resolver().find(&table).unwrap().is_empty());
        assert_eq!(
            resolver()
                .resolve(&table, &DuplicateStrategy::RemoveAll)
                .unwrap(),
            table
        );
    }

    #[test]
    fn parses_strategy_names() {
        assert_eq!(
            "keep-first".parse::<DuplicateStrategy>().unwrap(),
            DuplicateStrategy::KeepFirst
        );
        assert_eq!(
            "Keep_Last".parse::<DuplicateStrategy>().unwrap(),
            DuplicateStrategy::KeepLast
        );
        assert_eq!(
            "remove-all".parse::<DuplicateStrategy>().unwrap(),
            DuplicateStrategy::RemoveAll
        );
        assert!(matches!(
            "keep-some".parse::<DuplicateStrategy>(),
            Err(AssetTreeError::Validation(_))
        ));
    }
}
