use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

use crate::{codec::CODECS, error::AssetTreeError, templates::TemplateDefinition};

/// Lists and loads declarative template definitions from a directory. A file's extension picks
/// its codec from [CODECS].
#[derive(Debug, Clone)]
pub struct TemplateLoader {
    root: PathBuf,
}

impl TemplateLoader {
    pub fn new<P: AsRef<Path>>(root: P) -> TemplateLoader {
        TemplateLoader {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Template files under the directory, sorted by path.
    pub fn list(&self) -> Result<Vec<PathBuf>, AssetTreeError> {
        if !self.root.is_dir() {
            return Err(AssetTreeError::NotFound(format!(
                "Template directory {:?} does not exist",
                self.root
            )));
        }
        let extensions = CODECS.extensions();
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let supported = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
                .unwrap_or(false);
            if supported {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<TemplateDefinition, AssetTreeError> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let codec = CODECS.get(ext).ok_or_else(|| {
            AssetTreeError::Validation(format!("Unsupported template file type {path:?}"))
        })?;
        let contents = fs::read_to_string(path)?;
        let definition = codec.parse(&contents)?;
        tracing::debug!("[TemplateLoader] loaded '{}' from {:?}", definition.name, path);
        Ok(definition)
    }

    pub fn load_all(&self) -> Result<Vec<TemplateDefinition>, AssetTreeError> {
        self.list()?.iter().map(|path| self.load(path)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const PUMP_YAML: &str = r#"
name: Pump
description: A pump with its discharge pressure
attributes:
  - kind: reference
    name: Discharge Pressure
    matcher:
      contains: Pressure
"#;

    #[test]
    fn lists_and_loads_supported_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("pump.yaml"), PUMP_YAML).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a template").unwrap();

        let loader = TemplateLoader::new(dir.path());
        let files = loader.list().unwrap();
        assert_eq!(files.len(), 1);
        let definitions = loader.load_all().unwrap();
        assert_eq!(definitions[0].name, "Pump");
        assert_eq!(definitions[0].attributes.len(), 1);

        let err = loader.load(dir.path().join("notes.txt")).unwrap_err();
        assert!(matches!(err, AssetTreeError::Validation(_)));
    }

    #[test]
    fn missing_directory_is_not_found() {
        let loader = TemplateLoader::new("/definitely/not/here");
        assert!(matches!(loader.list(), Err(AssetTreeError::NotFound(_))));
    }
}
