// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::Result;
use serde::{Deserialize, Serialize};
use vcgen::VcGenOptions;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct InferenceOptions {
    /// Distinct values a constant-set summary tracks per variable before
    /// giving up on it.
    pub constant_bound: usize,
    /// Longest conjunction of literals kept by predicate abstraction.
    pub conjunct_bound: usize,
    pub vcgen: VcGenOptions,
    /// Extra `tracing` directive, e.g. `houdini=debug`.
    pub log_level: Option<String>,
    pub json_logs: bool,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        InferenceOptions {
            constant_bound: 3,
            conjunct_bound: 3,
            vcgen: VcGenOptions::default(),
            log_level: None,
            json_logs: false,
        }
    }
}

impl InferenceOptions {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InferenceError;
    use vcgen::VcEncoding;

    #[test]
    fn defaults_apply_to_missing_keys() {
        let options = InferenceOptions::from_toml_str("").unwrap();
        assert_eq!(options, InferenceOptions::default());
        assert_eq!(options.constant_bound, 3);
        assert!(options.vcgen.prune_dead_incarnations);
    }

    #[test]
    fn nested_vcgen_table() {
        let text = r#"
            conjunct-bound = 2
            log-level = "houdini=debug"

            [vcgen]
            encoding = "inline"
            prune-dead-incarnations = false
        "#;
        let options = InferenceOptions::from_toml_str(text).unwrap();
        assert_eq!(options.conjunct_bound, 2);
        assert_eq!(options.constant_bound, 3);
        assert_eq!(options.log_level.as_deref(), Some("houdini=debug"));
        assert_eq!(options.vcgen.encoding, VcEncoding::Inline);
        assert!(!options.vcgen.prune_dead_incarnations);
    }

    #[test]
    fn bad_values_are_reported() {
        let result = InferenceOptions::from_toml_str("constant-bound = \"three\"");
        assert!(matches!(result, Err(InferenceError::Options(_))));
    }
}
