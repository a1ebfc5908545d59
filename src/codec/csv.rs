//! Turns a [RawTable] read from a tree CSV into canonical rows: one [Node] per CSV row with
//! its full ancestor path, resolved against the remote server where the row names an existing
//! item.
use enumset::EnumSet;

use crate::{
    codec::table::RawTable,
    error::AssetTreeError,
    paths::path::path_string_to_list,
    properties::{
        supported_input_types, supported_search_types, FormulaParameters, ItemType, Node,
        RemoteId,
    },
    remote::{RemoteItem, RemoteSearch, SearchQuery},
    status::Status,
};

/// Which column identifies the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinColumn {
    Id,
    Name,
}

/// Parse a `Formula Parameters` cell: either a JSON object of strings (`{"$a": "Area >> T"}`)
/// or comma separated `$a=Area >> T` pairs.
pub fn parse_formula_parameters(cell: &str) -> Result<FormulaParameters, AssetTreeError> {
    let cell = cell.trim();
    if cell.starts_with('{') {
        return serde_json::from_str::<FormulaParameters>(cell).map_err(|e| {
            AssetTreeError::Validation(format!("Formula Parameters '{cell}' are not valid: {e}"))
        });
    }
    let mut parameters = FormulaParameters::new();
    for pair in cell.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((name, value)) = pair.split_once('=') else {
            return Err(AssetTreeError::Validation(format!(
                "Formula parameter '{pair}' is not of the form '$name=item'"
            )));
        };
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || value.is_empty() {
            return Err(AssetTreeError::Validation(format!(
                "Formula parameter '{pair}' has an empty side"
            )));
        }
        parameters.insert(name.to_string(), value.to_string());
    }
    Ok(parameters)
}

/// Headers containing `Level` (case-sensitive), in column order.
fn level_columns(table: &RawTable) -> Vec<usize> {
    table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.contains("Level"))
        .map(|(idx, _)| idx)
        .collect()
}

/// Forward fill the Level columns and join each row's levels into a path string.
fn paths_from_levels(table: &RawTable, levels: &[usize]) -> Result<Vec<String>, AssetTreeError> {
    for &column in levels {
        if table.cell(0, column).is_none() && table.column_any(column) {
            return Err(AssetTreeError::Validation(format!(
                "The first row must have a value in '{}' so that later rows can inherit it",
                table.headers[column]
            )));
        }
    }
    let mut carried: Vec<Option<String>> = vec![None; levels.len()];
    let mut paths = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        for (slot, &column) in levels.iter().enumerate() {
            if let Some(value) = table.cell(row, column) {
                carried[slot] = Some(value.to_string());
            }
        }
        paths.push(
            carried
                .iter()
                .flatten()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(" >> "),
        );
    }
    Ok(paths)
}

/// Loads tree rows from a CSV table.
pub struct CsvLoader<'a> {
    remote: &'a dyn RemoteSearch,
    workbook: Option<String>,
}

impl<'a> CsvLoader<'a> {
    pub fn new(remote: &'a dyn RemoteSearch) -> CsvLoader<'a> {
        CsvLoader {
            remote,
            workbook: None,
        }
    }

    /// Restrict name searches to items visible from this workbook.
    pub fn with_workbook<S: Into<String>>(mut self, workbook: S) -> CsvLoader<'a> {
        self.workbook = Some(workbook.into());
        self
    }

    /// Validate the table's shape and pick the join column.
    pub fn join_column(table: &RawTable) -> Result<JoinColumn, AssetTreeError> {
        let name = table.column("Name");
        let id = table.column("ID");
        if name.is_none() && id.is_none() {
            return Err(AssetTreeError::Validation(
                "A 'Name' or an 'ID' column must be provided".to_string(),
            ));
        }
        let name_complete = name.map(|c| table.column_complete(c)).unwrap_or(false);
        let id_complete = id.map(|c| table.column_complete(c)).unwrap_or(false);
        match (id_complete, name_complete) {
            (true, _) => Ok(JoinColumn::Id),
            (false, true) => Ok(JoinColumn::Name),
            (false, false) => Err(AssetTreeError::Validation(
                "Every row needs a value in the 'Name' or in the 'ID' column".to_string(),
            )),
        }
    }

    /// Produce the `Path` string of every row, from Level columns or a Path column.
    pub fn row_paths(table: &RawTable) -> Result<Vec<String>, AssetTreeError> {
        let levels = level_columns(table);
        let path = table.column("Path");
        match (levels.is_empty(), path) {
            (false, Some(_)) => Err(AssetTreeError::Validation(
                "Provide either Level columns or a Path column, not both".to_string(),
            )),
            (false, None) => paths_from_levels(table, &levels),
            (true, Some(column)) => Ok((0..table.len())
                .map(|row| table.cell(row, column).unwrap_or_default().to_string())
                .collect()),
            (true, None) => Err(AssetTreeError::Validation(
                "Levels columns or a path column must be provided".to_string(),
            )),
        }
    }

    pub fn load(&self, table: &RawTable, status: &mut Status) -> Result<Vec<Node>, AssetTreeError> {
        if table.is_empty() {
            return Err(AssetTreeError::Validation(
                "A tree may not be created from a table with no rows".to_string(),
            ));
        }
        let join = CsvLoader::join_column(table)?;
        tracing::debug!("[CsvLoader] rows are identified by {:?}", join);
        let paths = CsvLoader::row_paths(table)?;
        let name_col = table.column("Name");
        let id_col = table.column("ID");
        let type_col = table.column("Type");
        let formula_col = table.column("Formula");
        let parameters_col = table.column("Formula Parameters");
        let description_col = table.column("Description");
        let cell = |row: usize, col: Option<usize>| col.and_then(|c| table.cell(row, c));

        let mut nodes = Vec::with_capacity(table.len());
        let mut unresolved = 0;
        for row in 0..table.len() {
            let label = format!("CSV row {}", row + 2);

            let item_type = match cell(row, type_col) {
                Some(t) => match t.parse::<ItemType>() {
                    Ok(t) if supported_input_types().contains(t) => Some(t),
                    _ => {
                        status.warn(format!("{label}: unsupported type '{t}', row dropped"));
                        continue;
                    }
                },
                None => None,
            };

            let formula = cell(row, formula_col).map(|f| f.to_string());
            let formula_parameters = match cell(row, parameters_col) {
                Some(p) => match parse_formula_parameters(p) {
                    Ok(p) if p.is_empty() => None,
                    Ok(p) => Some(p),
                    Err(e) => {
                        status.catalog(&label, e)?;
                        continue;
                    }
                },
                None => None,
            };

            let mut node = Node {
                name: cell(row, name_col).unwrap_or_default().to_string(),
                path: path_string_to_list(&paths[row]),
                item_type,
                formula,
                formula_parameters,
                description: cell(row, description_col).map(|d| d.to_string()),
                id: None,
                referenced_id: cell(row, id_col).map(RemoteId::from),
            };

            let needs_lookup = node.formula.is_none() && node.item_type != Some(ItemType::Asset);
            if needs_lookup {
                let found = match &node.referenced_id {
                    Some(id) => self.resolve_id(id, &label, status)?,
                    None => self.resolve_name(&node.name, item_type, &label, status)?,
                };
                let Some(found) = found else {
                    unresolved += 1;
                    continue;
                };
                if node.name.is_empty() {
                    node.name = found.name.clone();
                }
                node.item_type = node.item_type.or(Some(found.item_type));
                node.referenced_id = Some(found.id);
            }
            nodes.push(node);
        }

        let any_id = id_col.map(|c| table.column_any(c)).unwrap_or(false);
        if nodes.is_empty() && unresolved > 0 && !any_id {
            return Err(AssetTreeError::NotFound(
                "None of the items named in the CSV could be found".to_string(),
            ));
        }
        tracing::info!(
            "Loaded {} of {} CSV rows ({} unresolved)",
            nodes.len(),
            table.len(),
            unresolved
        );
        Ok(nodes)
    }

    fn resolve_id(
        &self,
        id: &RemoteId,
        label: &str,
        status: &mut Status,
    ) -> Result<Option<RemoteItem>, AssetTreeError> {
        let mut found = self.remote.search(&SearchQuery::by_id(id.clone()))?;
        if found.is_empty() {
            status.warn(format!("{label}: no item with ID '{id}', row dropped"));
            return Ok(None);
        }
        Ok(Some(found.swap_remove(0)))
    }

    fn resolve_name(
        &self,
        name: &str,
        item_type: Option<ItemType>,
        label: &str,
        status: &mut Status,
    ) -> Result<Option<RemoteItem>, AssetTreeError> {
        let types: EnumSet<ItemType> = match item_type {
            Some(t) => t.into(),
            None => supported_search_types(),
        };
        let mut query = SearchQuery::by_name(name, types);
        query.workbook = self.workbook.clone();
        let mut found = self.remote.search(&query)?;
        found.sort_by(|a, b| a.id.cmp(&b.id));
        match found.len() {
            0 => {
                status.warn(format!("{label}: no item named '{name}' found, row dropped"));
                Ok(None)
            }
            1 => Ok(found.pop()),
            n => {
                let names = found
                    .iter()
                    .map(|i| format!("{} ({})", i.full_path(), i.id))
                    .collect::<Vec<_>>()
                    .join(", ");
                status.warn(format!(
                    "{label}: {n} items named '{name}' found, using the first: {names}"
                ));
                Ok(Some(found.swap_remove(0)))
            }
        }
    }
}
