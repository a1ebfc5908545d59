//! Reading and writing the row-oriented sources a tree is built from.
//!
//! ## Key Components
//!
//! - [`table::RawTable`] - A CSV file as headers plus optional string cells
//! - [`csv::CsvLoader`] - Turns a tree CSV (`Level N` or `Path` columns, `Name`/`ID`) into
//!   canonical [`Node`](crate::properties::Node) rows
//! - [`lookup::LookupTableBuilder`] - Exports grouped key/value tables as lookup-string
//!   calculations
//! - [`duplicates::DuplicateResolver`] - Finds rows sharing a group and key, and drops them
//!   per a [`DuplicateStrategy`]
//! - [`DefinitionCodec`] trait - Parses declarative template definitions; the global
//!   [`CODECS`] registry maps file extensions to codecs
//!
//! ## Built-in Codecs
//!
//! - **TOML** (`.toml`)
//! - **JSON** (`.json`)
//! - **YAML** (`.yaml`, `.yml`)
//!
//! Register custom codecs via [`CodecMap::insert`]:
//!
//! ```rust
//! use asset_tree_core::{AssetTreeError, codec::{CODECS, DefinitionCodec}, templates::TemplateDefinition};
//!
//! #[derive(Default)]
//! struct RonCodec;
//!
//! impl DefinitionCodec for RonCodec {
//!     fn parse(&self, content: &str) -> Result<TemplateDefinition, AssetTreeError> {
//!         todo!();
//!     }
//!
//!     fn generate_source(&self, definition: &TemplateDefinition) -> Result<String, AssetTreeError> {
//!         todo!();
//!     }
//! }
//! CODECS.insert::<RonCodec>("ron".to_string());
//! ```

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::{result::Result, sync::Arc};

use crate::{error::AssetTreeError, templates::TemplateDefinition};

pub mod csv;
pub mod duplicates;
pub mod lookup;
pub mod table;

pub use self::csv::{parse_formula_parameters, CsvLoader, JoinColumn};
pub use duplicates::{DuplicateGroup, DuplicateResolver, DuplicateStrategy};
pub use lookup::{LookupRow, LookupTableBuilder};
pub use table::RawTable;

/// Global singleton codec map with builtin codecs (toml, json, yaml, yml)
pub static CODECS: Lazy<CodecMap> = Lazy::new(CodecMap::create);

pub trait DefinitionCodec: Send + Sync {
    fn parse(&self, content: &str) -> Result<TemplateDefinition, AssetTreeError>;

    fn generate_source(&self, definition: &TemplateDefinition) -> Result<String, AssetTreeError>;
}

#[derive(Debug, Default, Clone)]
pub struct TomlCodec;

impl DefinitionCodec for TomlCodec {
    fn parse(&self, content: &str) -> Result<TemplateDefinition, AssetTreeError> {
        Ok(toml::from_str(content)?)
    }

    fn generate_source(&self, definition: &TemplateDefinition) -> Result<String, AssetTreeError> {
        Ok(toml::to_string_pretty(definition)?)
    }
}

#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl DefinitionCodec for JsonCodec {
    fn parse(&self, content: &str) -> Result<TemplateDefinition, AssetTreeError> {
        Ok(serde_json::from_str(content)?)
    }

    fn generate_source(&self, definition: &TemplateDefinition) -> Result<String, AssetTreeError> {
        Ok(serde_json::to_string_pretty(definition)?)
    }
}

#[derive(Debug, Default, Clone)]
pub struct YamlCodec;

impl DefinitionCodec for YamlCodec {
    fn parse(&self, content: &str) -> Result<TemplateDefinition, AssetTreeError> {
        Ok(serde_yaml::from_str(content)?)
    }

    fn generate_source(&self, definition: &TemplateDefinition) -> Result<String, AssetTreeError> {
        Ok(serde_yaml::to_string(definition)?)
    }
}

// It is better to express the complexity of the singleton than hide it. Also the CodecMap methods
// are used to properly unwrap this structure.
#[allow(clippy::type_complexity)]
pub struct CodecMap(Arc<RwLock<Vec<(String, Arc<dyn DefinitionCodec>)>>>);

impl Clone for CodecMap {
    fn clone(&self) -> Self {
        CodecMap(self.0.clone())
    }
}

impl CodecMap {
    pub fn create() -> Self {
        CodecMap(Arc::new(RwLock::new(vec![
            ("toml".to_string(), Arc::new(TomlCodec)),
            ("json".to_string(), Arc::new(JsonCodec)),
            ("yaml".to_string(), Arc::new(YamlCodec)),
            ("yml".to_string(), Arc::new(YamlCodec)),
        ])))
    }

    pub fn insert<T: DefinitionCodec + Default + 'static>(&self, extension: String) {
        let mut writer = self.0.write();
        if let Some(entry) = writer.iter_mut().find(|(ext, _)| ext == &extension) {
            entry.1 = Arc::new(T::default());
        } else {
            writer.push((extension, Arc::new(T::default())));
        }
    }

    pub fn get(&self, ext: &str) -> Option<Arc<dyn DefinitionCodec>> {
        let reader = self.0.read();
        reader
            .iter()
            .find(|(codec_ext, _value)| codec_ext.eq_ignore_ascii_case(ext))
            .map(|(_codec_ext, value)| value.clone())
    }

    pub fn extensions(&self) -> Vec<String> {
        let reader = self.0.read();
        reader
            .iter()
            .map(|(codec_ext, _value)| codec_ext.clone())
            .collect::<Vec<String>>()
    }
}
