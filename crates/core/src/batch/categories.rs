use std::collections::BTreeMap;

use crate::config::CategoryConfig;

const STRAT_PROJECT: &str = "ALL-Strat-v3.0.0";
const MESO_PROJECT: &str = "ALL-Meso-v3.0.0";

/// Freqmode to routing tag and project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    entries: BTreeMap<u32, CategoryConfig>,
}

impl CategoryTable {
    /// The production table.
    pub fn builtin() -> Self {
        let mut entries = vec![CategoryConfig {
            freqmode: 21,
            tag: "meso21".to_string(),
            project: "meso21".to_string(),
            inv_mode: None,
        }];
        for freqmode in [1, 2, 8, 17] {
            entries.push(CategoryConfig {
                freqmode,
                tag: format!("stnd{freqmode}"),
                project: STRAT_PROJECT.to_string(),
                inv_mode: None,
            });
        }
        for freqmode in [13, 14, 19, 22, 24] {
            entries.push(CategoryConfig {
                freqmode,
                tag: format!("meso{freqmode}"),
                project: MESO_PROJECT.to_string(),
                inv_mode: None,
            });
        }
        Self::from_entries(entries)
    }

    /// The configured table, or the built-in one when none is configured.
    pub fn from_config(categories: &[CategoryConfig]) -> Self {
        if categories.is_empty() {
            Self::builtin()
        } else {
            Self::from_entries(categories.to_vec())
        }
    }

    fn from_entries(entries: Vec<CategoryConfig>) -> Self {
        Self {
            entries: entries.into_iter().map(|c| (c.freqmode, c)).collect(),
        }
    }

    pub fn get(&self, freqmode: u32) -> Option<&CategoryConfig> {
        self.entries.get(&freqmode)
    }

    /// All entries ordered by freqmode.
    pub fn entries(&self) -> impl Iterator<Item = &CategoryConfig> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
