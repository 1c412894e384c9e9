//! Owns many players and ticks them in parallel.
//!
//! Each player is advanced by exactly one worker per tick; distinct
//! players run concurrently on a rayon pool.

use crate::backend::Backends;
use crate::config::PlayerConfig;
use crate::player::VideoPlayer;
use crate::tick::TickContext;
use rayon::prelude::*;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player-{}", self.0)
    }
}

pub struct VideoSystem {
    backends: Backends,
    players: Vec<(PlayerId, VideoPlayer)>,
    next_id: u64,
    pool: Option<rayon::ThreadPool>,
}

impl fmt::Debug for VideoSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoSystem")
            .field("players", &self.players.len())
            .field("threads", &self.pool.as_ref().map(|p| p.current_num_threads()))
            .finish()
    }
}

impl VideoSystem {
    /// A system ticking on rayon's global pool.
    pub fn new(backends: Backends) -> Self {
        Self {
            backends,
            players: Vec::new(),
            next_id: 1,
            pool: None,
        }
    }

    /// A system with its own pool of `threads` workers; 0 means one per CPU.
    pub fn with_threads(backends: Backends, threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let threads = if threads == 0 { num_cpus::get() } else { threads };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("vidcore-tick-{i}"))
            .build()?;
        tracing::debug!(threads, "Created player tick pool");
        Ok(Self {
            pool: Some(pool),
            ..Self::new(backends)
        })
    }

    /// Create a player against the system's backends.
    pub fn add(&mut self, config: PlayerConfig) -> PlayerId {
        let id = PlayerId(self.next_id);
        self.next_id += 1;
        let player = VideoPlayer::new(config, self.backends.clone());
        self.players.push((id, player));
        id
    }

    /// Detach a player. Dropping the returned value releases its resources.
    pub fn remove(&mut self, id: PlayerId) -> Option<VideoPlayer> {
        let pos = self.players.iter().position(|(pid, _)| *pid == id)?;
        Some(self.players.remove(pos).1)
    }

    pub fn get(&self, id: PlayerId) -> Option<&VideoPlayer> {
        self.players.iter().find(|(pid, _)| *pid == id).map(|(_, p)| p)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut VideoPlayer> {
        self.players
            .iter_mut()
            .find(|(pid, _)| *pid == id)
            .map(|(_, p)| p)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, &VideoPlayer)> {
        self.players.iter().map(|(id, p)| (*id, p))
    }

    /// Tick every player once. Returns when all players have been updated.
    pub fn update(&mut self, tick: &TickContext) {
        let players = &mut self.players;
        let mut run = move || {
            players
                .par_iter_mut()
                .for_each(|(_, player)| player.update(tick));
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}
