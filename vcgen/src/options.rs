// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use serde::{Deserialize, Serialize};

/// How the weakest precondition of a passive graph is written down.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum VcEncoding {
    /// One boolean `<label>_correct` per block, defined by its weakest
    /// precondition. The formula grows linearly with the graph.
    #[default]
    BlockVariables,
    /// Successor conditions are copied into their predecessors. Can grow
    /// exponentially on graphs with many joins.
    Inline,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct VcGenOptions {
    pub encoding: VcEncoding,
    /// Only mint join incarnations for variables that are live at the join.
    pub prune_dead_incarnations: bool,
    /// Log the passive form of every implementation at `trace` level.
    pub trace_passive: bool,
}

impl Default for VcGenOptions {
    fn default() -> Self {
        VcGenOptions {
            encoding: VcEncoding::default(),
            prune_dead_incarnations: true,
            trace_passive: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn encoding_names() {
        assert_eq!(VcEncoding::from_str("inline"), Ok(VcEncoding::Inline));
        assert_eq!(VcEncoding::BlockVariables.to_string(), "block-variables");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let options: VcGenOptions = toml::from_str("encoding = \"inline\"").unwrap();
        assert_eq!(options.encoding, VcEncoding::Inline);
        assert!(options.prune_dead_incarnations);
        assert!(!options.trace_passive);
    }
}
