use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use crate::{
    error::AssetTreeError,
    nodekey::casefold,
    paths::path::{path_list_to_string, path_string_to_list},
    properties::{Node, RemoteId},
};

/// Selects nodes of a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Matcher {
    /// The node with this remote id
    Id(RemoteId),
    /// A full path (`Root >> Area >> Item`), or a trailing part of one (`Area >> Item`).
    /// Compared case-insensitively.
    Path(String),
    /// A name compared case-insensitively. `*` and `?` act as glob wildcards and a
    /// `/pattern/` is used as a regular expression.
    Name(String),
    /// Every node at this depth (the root is depth 1)
    Depth(usize),
    Root,
}

enum Compiled {
    Id(RemoteId),
    Path(Vec<String>),
    NameEq(String),
    NamePattern(Regex),
    Depth(usize),
    Root,
}

/// A [Matcher] with its patterns compiled, ready to test many nodes.
pub struct NodePredicate(Compiled);

impl Matcher {
    pub fn compile(&self) -> Result<NodePredicate, AssetTreeError> {
        let compiled = match self {
            Matcher::Id(id) => Compiled::Id(id.clone()),
            Matcher::Path(path) => {
                Compiled::Path(path_string_to_list(path).iter().map(|s| casefold(s)).collect())
            }
            Matcher::Name(name) => {
                let trimmed = name.trim();
                if trimmed.len() > 1 && trimmed.starts_with('/') && trimmed.ends_with('/') {
                    let pattern = &trimmed[1..trimmed.len() - 1];
                    Compiled::NamePattern(
                        RegexBuilder::new(pattern).case_insensitive(true).build()?,
                    )
                } else if trimmed.contains(['*', '?']) {
                    Compiled::NamePattern(
                        RegexBuilder::new(&glob_to_regex(trimmed))
                            .case_insensitive(true)
                            .build()?,
                    )
                } else {
                    Compiled::NameEq(casefold(trimmed))
                }
            }
            Matcher::Depth(depth) => Compiled::Depth(*depth),
            Matcher::Root => Compiled::Root,
        };
        Ok(NodePredicate(compiled))
    }
}

impl NodePredicate {
    pub fn matches(&self, node: &Node) -> bool {
        match &self.0 {
            Compiled::Id(id) => node.id.as_ref() == Some(id),
            Compiled::Path(pattern) => {
                if pattern.is_empty() {
                    return false;
                }
                let full = node.full_path_list();
                full.len() >= pattern.len()
                    && full[full.len() - pattern.len()..]
                        .iter()
                        .zip(pattern.iter())
                        .all(|(segment, p)| casefold(segment) == *p)
            }
            Compiled::NameEq(name) => casefold(&node.name) == *name,
            Compiled::NamePattern(re) => re.is_match(&node.name),
            Compiled::Depth(depth) => node.depth() == *depth,
            Compiled::Root => node.path.is_empty(),
        }
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut pattern = String::from("^");
    for c in glob.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            _ => pattern.push_str(&regex::escape(&c.to_string())),
        }
    }
    pattern.push('$');
    pattern
}

impl FromStr for Matcher {
    type Err = AssetTreeError;

    /// `id:<id>`, `depth:<n>`, `@root`, anything containing `>>` is a path, everything else a
    /// name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AssetTreeError::Validation("Empty matcher".to_string()));
        }
        if let Some(id) = s.strip_prefix("id:") {
            return Ok(Matcher::Id(RemoteId::new(id.trim())));
        }
        if let Some(depth) = s.strip_prefix("depth:") {
            let depth = depth.trim().parse::<usize>().map_err(|e| {
                AssetTreeError::Validation(format!("Invalid depth '{depth}': {e}"))
            })?;
            return Ok(Matcher::Depth(depth));
        }
        if s.eq_ignore_ascii_case("@root") {
            return Ok(Matcher::Root);
        }
        if s.contains(">>") {
            return Ok(Matcher::Path(path_list_to_string(&path_string_to_list(s))));
        }
        Ok(Matcher::Name(s.to_string()))
    }
}

impl Display for Matcher {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Matcher::Id(id) => write!(f, "id:{id}"),
            Matcher::Path(path) => write!(f, "{path}"),
            Matcher::Name(name) => write!(f, "{name}"),
            Matcher::Depth(depth) => write!(f, "depth:{depth}"),
            Matcher::Root => write!(f, "@root"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::ItemType;

    fn temp() -> Node {
        Node::new("Temperature")
            .with_path(vec!["Plant".to_string(), "Area A".to_string()])
            .with_type(ItemType::Signal)
            .with_id(RemoteId::new("abc"))
    }

    #[test]
    fn path_matchers_accept_trailing_paths() {
        let node = temp();
        for pattern in ["plant >> area a >> temperature", "Area A >> Temperature"] {
            let p = Matcher::Path(pattern.to_string()).compile().unwrap();
            assert!(p.matches(&node), "{pattern}");
        }
        let p = Matcher::Path("Area B >> Temperature".to_string()).compile().unwrap();
        assert!(!p.matches(&node));
    }

    #[test]
    fn name_matchers() {
        let node = temp();
        assert!(Matcher::Name("TEMPERATURE".into()).compile().unwrap().matches(&node));
        assert!(Matcher::Name("temp*".into()).compile().unwrap().matches(&node));
        assert!(Matcher::Name("Temperatur?".into()).compile().unwrap().matches(&node));
        assert!(Matcher::Name("/^t.*ure$/".into()).compile().unwrap().matches(&node));
        assert!(!Matcher::Name("Temp".into()).compile().unwrap().matches(&node));
        assert!(Matcher::Name("/(/".into()).compile().is_err());
    }

    #[test]
    fn parse_matcher_strings() {
        assert_eq!("id:abc".parse::<Matcher>().unwrap(), Matcher::Id(RemoteId::new("abc")));
        assert_eq!("depth:2".parse::<Matcher>().unwrap(), Matcher::Depth(2));
        assert_eq!("@root".parse::<Matcher>().unwrap(), Matcher::Root);
        assert_eq!("Root".parse::<Matcher>().unwrap(), Matcher::Name("Root".to_string()));
        assert_eq!(
            "Plant>>Area A".parse::<Matcher>().unwrap(),
            Matcher::Path("Plant >> Area A".to_string())
        );
        assert_eq!("Pump*".parse::<Matcher>().unwrap(), Matcher::Name("Pump*".to_string()));
        assert!("depth:x".parse::<Matcher>().is_err());
    }
}
