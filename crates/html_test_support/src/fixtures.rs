//! Tree construction fixtures shared by the streaming tests.

use serde::Deserialize;

const TREE_CONSTRUCTION: &str = include_str!("../fixtures/tree_construction.toml");

#[derive(Clone, Debug, Deserialize)]
pub struct TreeConstructionCase {
    pub name: String,
    pub input: String,
    pub inner_html: String,
}

#[derive(Deserialize)]
struct FixtureFile {
    case: Vec<TreeConstructionCase>,
}

pub fn tree_construction_cases() -> Vec<TreeConstructionCase> {
    let file: FixtureFile = toml::from_str(TREE_CONSTRUCTION)
        .unwrap_or_else(|err| panic!("invalid tree construction fixtures: {err}"));
    file.case
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn fixture_names_are_unique_and_trimmed() {
        let cases = tree_construction_cases();
        assert!(!cases.is_empty());
        let mut seen = HashSet::new();
        for case in &cases {
            assert_eq!(case.name, case.name.trim());
            assert!(seen.insert(case.name.clone()), "duplicate {}", case.name);
        }
    }
}
