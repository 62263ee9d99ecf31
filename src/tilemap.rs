//! Grid Tilemap
//!
//! Static tile layout for a level, used for walkability and collision.

use serde::{Deserialize, Serialize};

/// Side length of the built-in store map
pub const GRID_SIZE: i32 = 10;

/// Kind of a single map cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileType {
    Empty,
    Wall,
    Prop,
    Start,
    NpcMarker,
}

impl TileType {
    /// Parse the single-digit code used in level files
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            '0' => Some(TileType::Empty),
            '1' => Some(TileType::Wall),
            '2' => Some(TileType::Prop),
            '3' => Some(TileType::Start),
            '4' => Some(TileType::NpcMarker),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TileType::Empty => "empty",
            TileType::Wall => "wall",
            TileType::Prop => "prop",
            TileType::Start => "start",
            TileType::NpcMarker => "npc",
        }
    }

    /// Only walls block movement; props and markers gate interaction instead
    pub fn blocks_movement(&self) -> bool {
        matches!(self, TileType::Wall)
    }
}

/// Integer cell coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Chebyshev distance (diagonal neighbours are distance 1)
    pub fn grid_distance(&self, other: &GridPosition) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// Cardinal facing/movement direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Down,
    Left,
    Right,
    Up,
}

impl Direction {
    /// Unit grid delta for a single step
    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::Up => (0, -1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Up => "up",
        }
    }
}

/// Tilemap for walkability checks
#[derive(Debug, Clone)]
pub struct Tilemap {
    pub width: u32,
    pub height: u32,
    tiles: Vec<TileType>,
}

impl Tilemap {
    /// Build a map from rows of tile codes (one string per row, top to bottom)
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self, String> {
        let height = rows.len();
        if height == 0 {
            return Err("map has no rows".to_string());
        }

        let width = rows[0].as_ref().chars().count();
        if width == 0 {
            return Err("map rows are empty".to_string());
        }

        let mut tiles = Vec::with_capacity(width * height);
        for (y, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.chars().count() != width {
                return Err(format!(
                    "row {} has {} tiles, expected {}",
                    y,
                    row.chars().count(),
                    width
                ));
            }
            for (x, code) in row.chars().enumerate() {
                let tile = TileType::from_code(code)
                    .ok_or_else(|| format!("unknown tile code '{}' at ({}, {})", code, x, y))?;
                tiles.push(tile);
            }
        }

        Ok(Self {
            width: width as u32,
            height: height as u32,
            tiles,
        })
    }

    /// Tile at a cell, or None when out of bounds
    pub fn tile(&self, x: i32, y: i32) -> Option<TileType> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        let idx = (y as u32 * self.width + x as u32) as usize;
        self.tiles.get(idx).copied()
    }

    /// Check if a grid tile is walkable
    pub fn is_tile_walkable(&self, x: i32, y: i32) -> bool {
        self.tile(x, y).is_some_and(|tile| !tile.blocks_movement())
    }

    /// Check if a fractional position is walkable (rounded to its cell)
    pub fn is_walkable(&self, x: f32, y: f32) -> bool {
        self.is_tile_walkable(x.round() as i32, y.round() as i32)
    }

    /// Try to move between fractional positions, sliding along walls
    pub fn resolve_movement(&self, from_x: f32, from_y: f32, to_x: f32, to_y: f32) -> (f32, f32) {
        if self.is_walkable(to_x, to_y) {
            return (to_x, to_y);
        }

        // Try moving only on X axis
        if self.is_walkable(to_x, from_y) {
            return (to_x, from_y);
        }

        // Try moving only on Y axis
        if self.is_walkable(from_x, to_y) {
            return (from_x, to_y);
        }

        (from_x, from_y)
    }

    /// All cells holding a given tile type, in row-major order
    pub fn positions_of(&self, kind: TileType) -> Vec<GridPosition> {
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, tile)| **tile == kind)
            .map(|(idx, _)| {
                let idx = idx as u32;
                GridPosition::new((idx % self.width) as i32, (idx / self.width) as i32)
            })
            .collect()
    }

    /// First start tile, if the map marks one
    pub fn start_position(&self) -> Option<GridPosition> {
        self.positions_of(TileType::Start).into_iter().next()
    }

    pub fn is_prop(&self, pos: GridPosition) -> bool {
        self.tile(pos.x, pos.y) == Some(TileType::Prop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_map() -> Tilemap {
        Tilemap::from_rows(&["1111", "1302", "1041", "1111"]).unwrap()
    }

    #[test]
    fn test_tile_codes() {
        assert_eq!(TileType::from_code('1'), Some(TileType::Wall));
        assert_eq!(TileType::from_code('4'), Some(TileType::NpcMarker));
        assert_eq!(TileType::from_code('x'), None);
    }

    #[test]
    fn test_from_rows_rejects_ragged_rows() {
        assert!(Tilemap::from_rows(&["111", "11"]).is_err());
        assert!(Tilemap::from_rows::<&str>(&[]).is_err());
        assert!(Tilemap::from_rows(&["1a1"]).is_err());
    }

    #[test]
    fn test_out_of_bounds_never_walkable() {
        let map = small_map();
        for (x, y) in [(-1, 0), (0, -1), (4, 1), (1, 4), (-5, -5), (100, 2)] {
            assert!(!map.is_tile_walkable(x, y), "({}, {}) should be blocked", x, y);
        }
    }

    #[test]
    fn test_props_and_markers_are_walkable() {
        let map = small_map();
        assert!(map.is_tile_walkable(1, 1)); // start
        assert!(map.is_tile_walkable(3, 1)); // prop
        assert!(map.is_tile_walkable(2, 2)); // npc marker
        assert!(map.is_tile_walkable(1, 2)); // empty
        assert!(!map.is_tile_walkable(0, 0));
    }

    #[test]
    fn test_start_and_positions() {
        let map = small_map();
        assert_eq!(map.start_position(), Some(GridPosition::new(1, 1)));
        assert_eq!(map.positions_of(TileType::NpcMarker), vec![GridPosition::new(2, 2)]);
    }

    #[test]
    fn test_resolve_movement_slides_along_walls() {
        let map = small_map();
        let (x, y) = map.resolve_movement(1.0, 1.0, 1.4, 1.8);
        assert_eq!((x, y), (1.4, 1.8));
        // Diagonal into the bottom wall keeps only the horizontal part
        let (x, y) = map.resolve_movement(1.0, 2.0, 1.6, 2.6);
        assert_eq!((x, y), (1.6, 2.0));
        // Straight into the wall at (3,2) stays put
        let (x, y) = map.resolve_movement(2.0, 2.0, 2.6, 2.0);
        assert_eq!((x, y), (2.0, 2.0));
    }

    #[test]
    fn test_grid_distance_is_chebyshev() {
        let a = GridPosition::new(2, 2);
        assert_eq!(a.grid_distance(&GridPosition::new(3, 3)), 1);
        assert_eq!(a.grid_distance(&GridPosition::new(2, 4)), 2);
        assert_eq!(a.grid_distance(&a), 0);
    }
}
