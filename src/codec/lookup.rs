//! Lookup-table export: turns a grouped key/value table into one string-valued calculation
//! per group, written as a CSV ready to be loaded into a tree.
use std::{collections::BTreeMap, io};

use crate::{codec::table::RawTable, error::AssetTreeError};

pub const DEFAULT_PARENT_PATH: &str = "Root Asset";
pub const LOOKUP_HEADERS: [&str; 4] = ["Name", "Formula", "Formula Parameters", "Parent Path"];

/// `[key, value]` pairs per group, groups ordered by name.
pub type Lookups = BTreeMap<String, Vec<(String, String)>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRow {
    pub name: String,
    pub formula: String,
    pub formula_parameters: String,
    pub parent_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTableBuilder {
    pub group_column: String,
    pub key_column: String,
    pub value_column: String,
}

impl LookupTableBuilder {
    pub fn new<S: Into<String>>(group_column: S, key_column: S, value_column: S) -> Self {
        LookupTableBuilder {
            group_column: group_column.into(),
            key_column: key_column.into(),
            value_column: value_column.into(),
        }
    }

    fn require(&self, table: &RawTable, column: &str) -> Result<usize, AssetTreeError> {
        table.column(column).ok_or_else(|| {
            AssetTreeError::Validation(format!("Lookup source has no '{column}' column"))
        })
    }

    /// Group the table's rows. Rows missing the group or the key are skipped; a missing value
    /// is an empty string.
    pub fn build(&self, table: &RawTable) -> Result<Lookups, AssetTreeError> {
        let group = self.require(table, &self.group_column)?;
        let key = self.require(table, &self.key_column)?;
        let value = self.require(table, &self.value_column)?;

        let mut lookups = Lookups::new();
        for row in 0..table.len() {
            let (Some(g), Some(k)) = (table.cell(row, group), table.cell(row, key)) else {
                tracing::debug!("[lookup] row {} has no group or key, skipped", row + 2);
                continue;
            };
            let v = table.cell(row, value).unwrap_or_default();
            lookups
                .entry(g.to_string())
                .or_default()
                .push((k.to_string(), v.to_string()));
        }
        Ok(lookups)
    }

    /// One row per group. `parent_paths` maps a group to the tree path its lookup belongs under.
    pub fn to_rows(
        lookups: &Lookups,
        parent_paths: &BTreeMap<String, String>,
    ) -> Result<Vec<LookupRow>, AssetTreeError> {
        lookups
            .iter()
            .map(|(group, pairs)| {
                Ok(LookupRow {
                    name: format!("{}_LookupString", group.replace(' ', "_")),
                    formula: lookup_formula(pairs)?,
                    formula_parameters: "{}".to_string(),
                    parent_path: parent_paths
                        .get(group)
                        .cloned()
                        .unwrap_or_else(|| DEFAULT_PARENT_PATH.to_string()),
                })
            })
            .collect()
    }

    pub fn write_csv<W: io::Write>(rows: &[LookupRow], writer: W) -> Result<(), AssetTreeError> {
        let mut table = RawTable::new(LOOKUP_HEADERS.to_vec());
        for row in rows {
            table.push_row(vec![
                Some(row.name.clone()),
                Some(row.formula.clone()),
                Some(row.formula_parameters.clone()),
                Some(row.parent_path.clone()),
            ]);
        }
        table.write_csv(writer)
    }
}

/// `"[["k1","v1"],["k2","v2"]]"`: the pairs JSON encoded, wrapped in double quotes as a string
/// literal the calculation engine evaluates.
fn lookup_formula(pairs: &[(String, String)]) -> Result<String, AssetTreeError> {
    let pairs = pairs
        .iter()
        .map(|(k, v)| [k.as_str(), v.as_str()])
        .collect::<Vec<_>>();
    Ok(format!("\"{}\"", serde_json::to_string(&pairs)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> RawTable {
        RawTable::from_bytes(
            b"Unit,Code,Meaning\nPump House,1,Running\nPump House,2,Stopped\nBoiler,A,Auto\n,9,Orphan\n",
        )
        .unwrap()
    }

    #[test]
    fn groups_pairs_and_formats_formulas() {
        let builder = LookupTableBuilder::new("Unit", "Code", "Meaning");
        let lookups = builder.build(&source()).unwrap();
        assert_eq!(lookups.len(), 2);
        assert_eq!(lookups["Pump House"].len(), 2);

        let parents = BTreeMap::from([("Boiler".to_string(), "Site >> Boiler".to_string())]);
        let rows = LookupTableBuilder::to_rows(&lookups, &parents).unwrap();
        assert_eq!(rows[0].name, "Boiler_LookupString");
        assert_eq!(rows[0].formula, r#""[["A","Auto"]]""#);
        assert_eq!(rows[0].parent_path, "Site >> Boiler");
        assert_eq!(rows[1].name, "Pump_House_LookupString");
        assert_eq!(rows[1].formula, r#""[["1","Running"],["2","Stopped"]]""#);
        assert_eq!(rows[1].formula_parameters, "{}");
        assert_eq!(rows[1].parent_path, DEFAULT_PARENT_PATH);
    }

    #[test]
    fn writes_lookup_csv() {
        let builder = LookupTableBuilder::new("Unit", "Code", "Meaning");
        let rows =
            LookupTableBuilder::to_rows(&builder.build(&source()).unwrap(), &BTreeMap::new())
                .unwrap();
        let mut out = Vec::new();
        LookupTableBuilder::write_csv(&rows, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Name,Formula,Formula Parameters,Parent Path\n"));
        assert!(text.contains("Boiler_LookupString"));
        assert!(LookupTableBuilder::new("Unit", "Missing", "Meaning")
            .build(&source())
            .is_err());
    }

    #[test]
    fn quotes_in_values_stay_valid_json() {
        let table = RawTable::from_bytes(
            b"Unit,Code,Meaning\nPress,1,Operator's stop\nPress,2,\"Say \"\"halt\"\"\"\n",
        )
        .unwrap();
        let lookups = LookupTableBuilder::new("Unit", "Code", "Meaning")
            .build(&table)
            .unwrap();
        let rows = LookupTableBuilder::to_rows(&lookups, &BTreeMap::new()).unwrap();
        let formula = &rows[0].formula;
        assert!(formula.starts_with('"') && formula.ends_with('"'));
        let pairs =
            serde_json::from_str::<Vec<Vec<String>>>(&formula[1..formula.len() - 1]).unwrap();
        assert_eq!(
            pairs,
            vec![
                vec!["1".to_string(), "Operator's stop".to_string()],
                vec!["2".to_string(), "Say \"halt\"".to_string()],
            ]
        );
    }
}
