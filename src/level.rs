//! Level Registry
//!
//! Loads level layouts (tile map, start tile, NPCs) from TOML files. One
//! layout file can serve several level ids.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::DataError;
use crate::npc::{Npc, RawNpc};
use crate::tilemap::{GridPosition, Tilemap};

const BUILTIN_LEVELS: &[(&str, &str)] = &[(
    "corner_store.toml",
    include_str!("../data/levels/corner_store.toml"),
)];

#[derive(Debug, Clone, Deserialize)]
pub struct RawLevelFile {
    pub level: RawLevel,
    #[serde(default)]
    pub npcs: Vec<RawNpc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLevel {
    pub ids: Vec<u32>,
    pub name: String,
    /// Overrides the map's start tile
    #[serde(default)]
    pub start: Option<[i32; 2]>,
    pub rows: Vec<String>,
}

/// Static data for one playable level
#[derive(Debug, Clone)]
pub struct Level {
    pub id: u32,
    pub name: String,
    pub map: Tilemap,
    pub start: GridPosition,
    /// NPCs in registration order
    pub npcs: Vec<Npc>,
}

impl Level {
    /// Resolve every level a layout file declares
    pub fn from_raw(raw: &RawLevelFile) -> Result<Vec<Self>, String> {
        if raw.level.ids.is_empty() {
            return Err("layout declares no level ids".to_string());
        }

        let map = Tilemap::from_rows(raw.level.rows.as_slice())?;
        let start = match raw.level.start {
            Some([x, y]) => GridPosition::new(x, y),
            None => map
                .start_position()
                .ok_or_else(|| "map has no start tile".to_string())?,
        };
        if !map.is_tile_walkable(start.x, start.y) {
            return Err(format!("start ({}, {}) is not walkable", start.x, start.y));
        }

        let mut seen = HashSet::new();
        for npc in &raw.npcs {
            if !seen.insert(npc.id.as_str()) {
                return Err(format!("duplicate npc id '{}'", npc.id));
            }
            let [x, y] = npc.position;
            if !map.is_tile_walkable(x, y) {
                return Err(format!("npc '{}' stands on a blocked tile ({}, {})", npc.id, x, y));
            }
        }

        raw.level
            .ids
            .iter()
            .map(|&id| {
                let npcs = raw
                    .npcs
                    .iter()
                    .filter(|npc| npc.level_id.is_none_or(|level| level == id))
                    .map(|npc| Npc::from_raw(npc, id))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self {
                    id,
                    name: raw.level.name.clone(),
                    map: map.clone(),
                    start,
                    npcs,
                })
            })
            .collect()
    }

    pub fn npc(&self, npc_id: &str) -> Option<&Npc> {
        self.npcs.iter().find(|n| n.id == npc_id)
    }
}

/// Registry of level layouts keyed by level id
pub struct LevelRegistry {
    levels: BTreeMap<u32, Arc<Level>>,
}

impl LevelRegistry {
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    /// Registry holding the layouts compiled into the crate
    pub fn builtin() -> Result<Self, DataError> {
        let mut registry = Self::new();
        for (name, contents) in BUILTIN_LEVELS {
            registry.load_str(name, contents)?;
        }
        Ok(registry)
    }

    /// Load all layout files from a directory, returning how many levels were added
    pub fn load_from_directory(&mut self, path: &Path) -> Result<usize, DataError> {
        if !path.exists() {
            warn!("Level directory does not exist: {:?}", path);
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
            count += self.load_str(&file_path.display().to_string(), &contents)?;
        }

        info!("Loaded {} levels from {:?}", count, path);
        Ok(count)
    }

    fn load_str(&mut self, source_name: &str, contents: &str) -> Result<usize, DataError> {
        let raw: RawLevelFile = toml::from_str(contents).map_err(|source| DataError::Parse {
            source_name: source_name.to_string(),
            source,
        })?;

        let levels = Level::from_raw(&raw).map_err(|reason| DataError::Invalid {
            source_name: source_name.to_string(),
            reason,
        })?;

        let count = levels.len();
        for level in levels {
            if self.levels.contains_key(&level.id) {
                return Err(DataError::DuplicateLevel(level.id));
            }
            self.levels.insert(level.id, Arc::new(level));
        }
        Ok(count)
    }

    pub fn get(&self, level_id: u32) -> Option<Arc<Level>> {
        self.levels.get(&level_id).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = &u32> {
        self.levels.keys()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl Default for LevelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
