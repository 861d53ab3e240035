//! Transport-free server/client loop: the server writes one packet per owner
//! per tick and each owner's client world reads it straight back.

use std::any::Any;
use std::collections::HashMap;

use glam::DVec3;
use interest_common::{EntityId, OwnerId};
use interest_kernel::{Event, HandlerKind, Response, World};
use serde::Serialize;

use crate::config::CliConfig;

/// Last known position per entity, threaded into handlers as context.
pub type Positions = HashMap<EntityId, DVec3>;

const POSITION_LEN: usize = 24;

/// Per-owner outcome of one tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickStats {
    pub tick: u64,
    pub owner: u64,
    pub bytes: usize,
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub errors: usize,
    pub client_entities: usize,
}

struct Mover {
    id: EntityId,
    orbit: f64,
    phase: f64,
    speed: f64,
}

impl Mover {
    fn position(&self, tick: u64) -> DVec3 {
        let angle = self.phase + self.speed * tick as f64;
        DVec3::new(self.orbit * angle.cos(), 0.0, self.orbit * angle.sin())
    }
}

struct Client {
    owner: OwnerId,
    world: World,
    positions: Positions,
}

pub struct Simulation {
    server: World,
    movers: Vec<Mover>,
    positions: Positions,
    clients: Vec<Client>,
    buffer: Vec<u8>,
    tick: u64,
}

impl Simulation {
    /// `entities` movers on concentric orbits; the first `owners` of them are
    /// observers, one per owner.
    pub fn new(config: &CliConfig, entities: usize, owners: u64, radius: u8) -> anyhow::Result<Self> {
        let mut server = World::with_seed(config.seed);
        let [cx, cy, cz] = config.grid.chunk_count();
        let [sx, sy, sz] = config.grid.chunk_size();
        let [ox, oy, oz] = config.grid.chunk_offset();
        server.set_chunk_count(cx, cy, cz)?;
        server.set_chunk_size(sx, sy, sz)?;
        server.set_chunk_offset(ox, oy, oz)?;
        server.set_handler(HandlerKind::WriteCreate, Box::new(send_position))?;
        server.set_handler(HandlerKind::WriteUpdate, Box::new(send_position))?;

        let ring = f64::from(sx);
        let mut movers = Vec::with_capacity(entities);
        for i in 0..entities {
            let id = EntityId(i as u64 + 1);
            server.track(id)?;
            movers.push(Mover {
                id,
                orbit: ring * (1 + i % 8) as f64,
                // Golden angle spreads movers evenly around each orbit.
                phase: i as f64 * 2.399_963,
                speed: 0.05 + 0.02 * (i % 5) as f64,
            });
        }

        let mut clients = Vec::new();
        for (k, mover) in movers.iter().take(owners as usize).enumerate() {
            let owner = OwnerId(k as u64 + 1);
            server.set_owner(mover.id, Some(owner))?;
            server.set_radius(mover.id, radius)?;

            let mut world = World::new();
            world.set_handler(HandlerKind::ReadCreate, Box::new(receive_position))?;
            world.set_handler(HandlerKind::ReadUpdate, Box::new(receive_position))?;
            world.set_handler(HandlerKind::ReadRemove, Box::new(forget_position))?;
            clients.push(Client {
                owner,
                world,
                positions: Positions::new(),
            });
        }
        tracing::info!(entities, owners = clients.len(), radius, "simulation ready");

        Ok(Self {
            server,
            movers,
            positions: Positions::new(),
            clients,
            buffer: vec![0; config.buffer_size],
            tick: 0,
        })
    }

    /// Move every entity, then sync every owner's client.
    pub fn step(&mut self) -> anyhow::Result<Vec<TickStats>> {
        self.tick += 1;
        for mover in &self.movers {
            let position = mover.position(self.tick);
            self.positions.insert(mover.id, position);
            let chunk = self.server.grid()?.chunk_from_position(position);
            match chunk {
                Ok(chunk) => self.server.set_chunk(mover.id, chunk)?,
                Err(_) => self.server.clear_chunk(mover.id)?,
            }
        }

        let mut stats = Vec::with_capacity(self.clients.len());
        for client in &mut self.clients {
            let bytes = interest_wire::write(
                &mut self.server,
                client.owner,
                &mut self.buffer,
                Some(&mut self.positions as &mut dyn Any),
            )?;
            let summary = interest_wire::read(
                &mut client.world,
                client.owner,
                &self.buffer[..bytes],
                Some(&mut client.positions as &mut dyn Any),
            )?;
            stats.push(TickStats {
                tick: self.tick,
                owner: client.owner.0,
                bytes,
                created: summary.created,
                updated: summary.updated,
                removed: summary.removed,
                errors: summary.errors,
                client_entities: client.world.entity_count()?,
            });
        }
        Ok(stats)
    }

    /// Positions a client has received so far.
    #[cfg(test)]
    pub fn client_positions(&self, owner: OwnerId) -> Option<&Positions> {
        self.clients.iter().find(|c| c.owner == owner).map(|c| &c.positions)
    }
}

fn send_position(event: &mut Event<'_>) -> Response {
    let entity = event.entity();
    let Some(position) = event.context::<Positions>().and_then(|p| p.get(&entity)).copied() else {
        return Response::ACCEPT;
    };
    let mut bytes = [0u8; POSITION_LEN];
    for (slot, value) in bytes.chunks_exact_mut(8).zip(position.to_array()) {
        slot.copy_from_slice(&value.to_le_bytes());
    }
    event.write(&bytes)
}

fn receive_position(event: &mut Event<'_>) -> Response {
    let input = event.input();
    if input.len() != POSITION_LEN {
        return Response::ACCEPT;
    }
    let mut xyz = [0.0f64; 3];
    for (value, chunk) in xyz.iter_mut().zip(input.chunks_exact(8)) {
        if let Ok(raw) = <[u8; 8]>::try_from(chunk) {
            *value = f64::from_le_bytes(raw);
        }
    }
    let entity = event.entity();
    if let Some(positions) = event.context_mut::<Positions>() {
        positions.insert(entity, DVec3::from_array(xyz));
    }
    Response::ACCEPT
}

fn forget_position(event: &mut Event<'_>) -> Response {
    let entity = event.entity();
    if let Some(positions) = event.context_mut::<Positions>() {
        positions.remove(&entity);
    }
    Response::ACCEPT
}
