//! Quest Registry
//!
//! Validated quest table keyed by level id. Quests are checked when loaded;
//! a level without an entry has no quest and the session shows the
//! "quest not found" panel for it.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::definition::{QuestDefinition, RawQuestFile};
use crate::error::DataError;

const BUILTIN_QUESTS: &[(&str, &str)] = &[
    (
        "level1_saving_basics.toml",
        include_str!("../../data/quests/level1_saving_basics.toml"),
    ),
    (
        "level2_needs_vs_wants.toml",
        include_str!("../../data/quests/level2_needs_vs_wants.toml"),
    ),
    (
        "level3_earn_and_spend.toml",
        include_str!("../../data/quests/level3_earn_and_spend.toml"),
    ),
    (
        "level4_future_goals.toml",
        include_str!("../../data/quests/level4_future_goals.toml"),
    ),
    (
        "level5_snack_mix.toml",
        include_str!("../../data/quests/level5_snack_mix.toml"),
    ),
];

/// Registry for all quest definitions
pub struct QuestRegistry {
    quests: BTreeMap<u32, Arc<QuestDefinition>>,
}

impl QuestRegistry {
    pub fn new() -> Self {
        Self {
            quests: BTreeMap::new(),
        }
    }

    /// Registry holding the quests compiled into the crate
    pub fn builtin() -> Result<Self, DataError> {
        let mut registry = Self::new();
        for (name, contents) in BUILTIN_QUESTS {
            registry.load_str(name, contents)?;
        }
        Ok(registry)
    }

    /// Load every quest file in a directory. Invalid files abort the load so
    /// a broken table never reaches gameplay.
    pub fn load_from_directory(&mut self, path: &Path) -> Result<usize, DataError> {
        if !path.exists() {
            warn!("Quest directory does not exist: {:?}", path);
            return Ok(0);
        }

        let entries = fs::read_dir(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut files: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("toml"))
            .collect();
        files.sort();

        let mut count = 0;
        for file_path in files {
            let contents = fs::read_to_string(&file_path).map_err(|source| DataError::Io {
                path: file_path.clone(),
                source,
            })?;
            self.load_str(&file_path.display().to_string(), &contents)?;
            count += 1;
        }

        info!("Loaded {} quest definitions from {:?}", count, path);
        Ok(count)
    }

    fn load_str(&mut self, source_name: &str, contents: &str) -> Result<(), DataError> {
        let raw: RawQuestFile = toml::from_str(contents).map_err(|source| DataError::Parse {
            source_name: source_name.to_string(),
            source,
        })?;

        let quest = QuestDefinition::from_raw(&raw.quest).map_err(|reason| DataError::Invalid {
            source_name: source_name.to_string(),
            reason,
        })?;

        if self.quests.contains_key(&quest.level_id) {
            return Err(DataError::DuplicateLevel(quest.level_id));
        }

        info!("Loaded quest: {} (level {})", quest.title, quest.level_id);
        self.quests.insert(quest.level_id, Arc::new(quest));
        Ok(())
    }

    /// Quest for a level, or None when the level has none
    pub fn get(&self, level_id: u32) -> Option<Arc<QuestDefinition>> {
        self.quests.get(&level_id).cloned()
    }

    pub fn contains(&self, level_id: u32) -> bool {
        self.quests.contains_key(&level_id)
    }

    pub fn level_ids(&self) -> impl Iterator<Item = &u32> {
        self.quests.keys()
    }

    pub fn len(&self) -> usize {
        self.quests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }
}

impl Default for QuestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::definition::ItemCategory;
    use crate::quest::reward::RewardKind;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_table() {
        let registry = QuestRegistry::builtin().unwrap();
        assert_eq!(registry.len(), 5);
        assert_eq!(registry.level_ids().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);

        let budgets: Vec<u32> = (1..=4).map(|id| registry.get(id).unwrap().budget).collect();
        assert_eq!(budgets, vec![20, 25, 15, 30]);
        let fees: Vec<u32> = (1..=4).map(|id| registry.get(id).unwrap().fee.amount).collect();
        assert_eq!(fees, vec![2, 2, 3, 1]);

        let future = registry.get(4).unwrap();
        assert_eq!(future.slots[0].category, ItemCategory::Save);

        let snack = registry.get(5).unwrap();
        assert_eq!(snack.title, "Lunch Rush Snack Mix");
        assert_eq!(snack.reward, RewardKind::SnackXp);
        assert_eq!(snack.categories(), vec![ItemCategory::Fuel, ItemCategory::Treat]);
    }

    #[test]
    fn test_unknown_level_has_no_quest() {
        let registry = QuestRegistry::builtin().unwrap();
        assert!(registry.get(0).is_none());
        assert!(registry.get(6).is_none());
        assert!(!registry.contains(42));
    }

    #[test]
    fn test_load_from_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("level9.toml"),
            include_str!("../../data/quests/level3_earn_and_spend.toml")
                .replace("level_id = 3", "level_id = 9"),
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut registry = QuestRegistry::new();
        assert_eq!(registry.load_from_directory(dir.path()).unwrap(), 1);
        assert_eq!(registry.get(9).unwrap().title, "Earn & Spend");
    }

    #[test]
    fn test_invalid_file_fails_load() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("broken.toml"),
            include_str!("../../data/quests/level1_saving_basics.toml")
                .replace("budget = 20", "budget = 0"),
        )
        .unwrap();

        let mut registry = QuestRegistry::new();
        let err = registry.load_from_directory(dir.path()).unwrap_err();
        assert!(matches!(err, DataError::Invalid { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_missing_field_is_parse_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("partial.toml"), "[quest]\nlevel_id = 3\ntitle = \"x\"\n").unwrap();

        let mut registry = QuestRegistry::new();
        let err = registry.load_from_directory(dir.path()).unwrap_err();
        assert!(matches!(err, DataError::Parse { .. }));
    }

    #[test]
    fn test_duplicate_level_rejected() {
        let mut registry = QuestRegistry::builtin().unwrap();
        let err = registry
            .load_str("dup", include_str!("../../data/quests/level2_needs_vs_wants.toml"))
            .unwrap_err();
        assert!(matches!(err, DataError::DuplicateLevel(2)));
    }
}
