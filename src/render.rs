//! Rendering boundary
//!
//! The simulation never draws. Each tick a [`Renderer`] receives the
//! immutable [`Snapshot`] plus pixel-space [`Placement`]s for every entity.

use serde::Serialize;
use tracing::debug;

use crate::quest::Stage;
use crate::quest::engine::PROGRESS_STEPS;
use crate::session::Snapshot;
use crate::tilemap::GridPosition;

/// Draw layers, back to front
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum EntityKind {
    Prop,
    Npc,
    Player,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Prop => "prop",
            EntityKind::Npc => "npc",
            EntityKind::Player => "player",
        }
    }

    fn layer(&self) -> u32 {
        match self {
            EntityKind::Prop => 0,
            EntityKind::Npc | EntityKind::Player => 1,
        }
    }
}

/// One entity positioned in pixel space
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub kind: EntityKind,
    /// NPC id; None for the player and props
    pub id: Option<String>,
    pub x: f32,
    pub y: f32,
    /// Sprite sheet frame
    pub frame: u32,
    /// Draw order; higher draws later
    pub depth: f32,
}

/// Top-left pixel of a (possibly fractional) tile position
pub fn grid_to_pixel(x: f32, y: f32, tile_size: f32) -> (f32, f32) {
    ((x * tile_size).round(), (y * tile_size).round())
}

/// Depth for painter's ordering: layer first, then further down draws on top
pub fn calculate_depth(y: f32, layer: u32) -> f32 {
    layer as f32 * 10000.0 + y
}

fn place_tile(kind: EntityKind, id: Option<String>, pos: GridPosition, frame: u32, tile_size: f32) -> Placement {
    let (x, y) = grid_to_pixel(pos.x as f32, pos.y as f32, tile_size);
    Placement {
        kind,
        id,
        x,
        y,
        frame,
        depth: calculate_depth(pos.y as f32, kind.layer()),
    }
}

/// Every visible entity of a snapshot, sorted by depth. Resolved NPCs are
/// left out.
pub fn placements(snapshot: &Snapshot, tile_size: f32) -> Vec<Placement> {
    let mut out: Vec<Placement> = snapshot
        .props
        .iter()
        .map(|pos| place_tile(EntityKind::Prop, None, *pos, 0, tile_size))
        .collect();

    out.extend(
        snapshot
            .npcs
            .iter()
            .filter(|npc| !npc.completed)
            .map(|npc| place_tile(EntityKind::Npc, Some(npc.id.clone()), npc.position, 1, tile_size)),
    );

    let (bx, by) = snapshot.world.body;
    let (x, y) = grid_to_pixel(bx, by, tile_size);
    out.push(Placement {
        kind: EntityKind::Player,
        id: None,
        x,
        y,
        frame: snapshot.world.frame.frame_index,
        depth: calculate_depth(by, EntityKind::Player.layer()),
    });

    out.sort_by(|a, b| a.depth.total_cmp(&b.depth));
    out
}

pub trait Renderer {
    fn render(&mut self, snapshot: &Snapshot, placements: &[Placement]);
}

/// Logs what would be drawn. Only logs when the picture changes.
#[derive(Debug, Default)]
pub struct TraceRenderer {
    last: Vec<Placement>,
    last_stage: Option<Stage>,
}

impl TraceRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for TraceRenderer {
    fn render(&mut self, snapshot: &Snapshot, placements: &[Placement]) {
        if self.last_stage != Some(snapshot.stage) {
            debug!(
                "Stage {} ({}/{})",
                snapshot.stage.as_str(),
                snapshot.progress_step,
                PROGRESS_STEPS
            );
            self.last_stage = Some(snapshot.stage);
        }
        if self.last.as_slice() == placements {
            return;
        }
        for placement in placements {
            debug!(
                "{} {:?} at ({}, {}) frame {}",
                placement.kind.as_str(),
                placement.id,
                placement.x,
                placement.y,
                placement.frame
            );
        }
        self.last = placements.to_vec();
    }
}
