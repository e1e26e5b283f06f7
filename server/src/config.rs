//! Runtime configuration for the server and the rooms it hosts.

use rand::Rng;
use shared::{
    AFK_TIMEOUT_SECS, MAX_FRAME_BYTES, SPAWN_MAX_X, SPAWN_MAX_Y, SPAWN_MIN_X, SPAWN_MIN_Y,
};
use std::time::Duration;

/// Rectangle in which newly joined players are placed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnArea {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl Default for SpawnArea {
    fn default() -> Self {
        Self {
            min_x: SPAWN_MIN_X,
            max_x: SPAWN_MAX_X,
            min_y: SPAWN_MIN_Y,
            max_y: SPAWN_MAX_Y,
        }
    }
}

impl SpawnArea {
    /// Picks a uniformly random point inside the area. Reversed bounds are tolerated.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> (f32, f32) {
        let x = rng.gen_range(self.min_x.min(self.max_x)..=self.min_x.max(self.max_x));
        let y = rng.gen_range(self.min_y.min(self.max_y)..=self.min_y.max(self.max_y));
        (x, y)
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        (self.min_x.min(self.max_x)..=self.min_x.max(self.max_x)).contains(&x)
            && (self.min_y.min(self.max_y)..=self.min_y.max(self.max_y)).contains(&y)
    }
}

/// Per-room game rules.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// How long an alive player may stay silent during a game.
    pub afk_timeout: Duration,
    pub spawn_area: SpawnArea,
    /// Fixed seed for spawn positions; `None` draws from OS entropy.
    pub rng_seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            afk_timeout: Duration::from_secs(AFK_TIMEOUT_SECS),
            spawn_area: SpawnArea::default(),
            rng_seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_connections: usize,
    pub max_frame_bytes: usize,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            max_connections: 1024,
            max_frame_bytes: MAX_FRAME_BYTES,
            game: GameConfig::default(),
        }
    }
}
