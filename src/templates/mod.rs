//! Templates: named, pure functions from metadata rows to tree rows.
//!
//! Every template is registered by name in the global [TEMPLATES] registry. The built-in `HVAC`
//! and `HVAC With Calcs` templates are declarative [TemplateDefinition]s embedded in the crate;
//! more can be loaded from a directory with [TemplateLoader] or registered as plain functions.
//!
//! ```rust
//! use asset_tree_core::templates::{MetadataRow, TEMPLATES};
//!
//! let metadata = vec![
//!     MetadataRow::new("Area A_Temperature", "My HVAC Units >> Facility #1", "Area A"),
//!     MetadataRow::new("Area A_Relative Humidity", "My HVAC Units >> Facility #1", "Area A"),
//! ];
//! let output = TEMPLATES.apply("HVAC", &metadata).unwrap();
//! assert_eq!(output.nodes.len(), 3);
//! ```
use include_dir::{include_dir, Dir};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::{collections::BTreeMap, path::Path, sync::Arc};

use crate::{codec::CODECS, error::AssetTreeError};

pub mod definition;
pub mod loader;

pub use definition::{Attribute, MetadataRow, NameMatcher, TemplateDefinition, TemplateOutput};
pub use loader::TemplateLoader;

static BUILTIN_TEMPLATES: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/templates");

/// Global singleton template registry with the built-in templates
pub static TEMPLATES: Lazy<TemplateRegistry> = Lazy::new(TemplateRegistry::create);

pub type TemplateFn = Arc<dyn Fn(&[MetadataRow]) -> TemplateOutput + Send + Sync>;

/// Thread-safe registry of templates by name.
///
/// Pattern matches [`CodecMap`](crate::codec::CodecMap) for consistency.
pub struct TemplateRegistry(Arc<RwLock<BTreeMap<String, TemplateFn>>>);

impl Clone for TemplateRegistry {
    fn clone(&self) -> Self {
        TemplateRegistry(self.0.clone())
    }
}

impl TemplateRegistry {
    pub fn empty() -> Self {
        TemplateRegistry(Arc::new(RwLock::new(BTreeMap::new())))
    }

    /// Create registry with the built-in templates
    pub fn create() -> Self {
        let registry = TemplateRegistry::empty();
        for file in BUILTIN_TEMPLATES.files() {
            let path = file.path();
            let parsed = match (
                path.extension().and_then(|e| e.to_str()),
                file.contents_utf8(),
            ) {
                (Some(ext), Some(contents)) => match CODECS.get(ext) {
                    Some(codec) => codec.parse(contents),
                    None => continue,
                },
                _ => continue,
            };
            match parsed {
                Ok(definition) => registry.register_definition(definition),
                Err(e) => tracing::warn!("[TEMPLATES] built-in template {:?} is invalid: {}", path, e),
            }
        }
        registry
    }

    pub fn register<F>(&self, name: String, template: F)
    where
        F: Fn(&[MetadataRow]) -> TemplateOutput + Send + Sync + 'static,
    {
        let mut writer = self.0.write();
        if writer.insert(name.clone(), Arc::new(template)).is_some() {
            tracing::debug!("[TEMPLATES] replaced template '{}'", name);
        }
    }

    pub fn register_definition(&self, definition: TemplateDefinition) {
        let name = definition.name.clone();
        self.register(name, move |rows| definition.build(rows));
    }

    pub fn get(&self, name: &str) -> Option<TemplateFn> {
        let reader = self.0.read();
        reader
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name.trim()))
            .map(|(_, template)| template.clone())
    }

    pub fn names(&self) -> Vec<String> {
        self.0.read().keys().cloned().collect()
    }

    pub fn apply(&self, name: &str, metadata: &[MetadataRow]) -> Result<TemplateOutput, AssetTreeError> {
        let template = self
            .get(name)
            .ok_or_else(|| AssetTreeError::NotFound(format!("No template named '{name}'")))?;
        Ok(template(metadata))
    }

    /// Load every definition in `dir` and register it. Returns the names registered.
    pub fn register_dir<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<String>, AssetTreeError> {
        let definitions = TemplateLoader::new(dir.as_ref()).load_all()?;
        let names = definitions.iter().map(|d| d.name.clone()).collect();
        for definition in definitions {
            self.register_definition(definition);
        }
        Ok(names)
    }
}
