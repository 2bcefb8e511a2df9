//! Mapping from live agents to renderable instances.
//!
//! Drawing is somebody else's job; this module only fixes the contract a
//! renderer relies on: one instance per live agent in storage order, and
//! every remaining slot parked off-scene with zero scale. A slot is hidden
//! exactly when its `y` is [`HIDDEN_Y`]; its colour is irrelevant and left
//! black.

use serde::Serialize;

use crate::world::{Agent, Group, Population};

pub const AGENT_SIZE: f64 = 0.12;
/// Where unused slots are parked.
pub const HIDDEN_Y: f64 = -100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderInstance {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub scale: f64,
    pub color: &'static str,
}

impl RenderInstance {
    pub fn hidden() -> Self {
        Self {
            x: 0.0,
            y: HIDDEN_Y,
            z: 0.0,
            scale: 0.0,
            color: "#000000",
        }
    }
}

impl From<&Agent> for RenderInstance {
    fn from(agent: &Agent) -> Self {
        Self {
            x: agent.x,
            y: AGENT_SIZE / 2.0,
            z: agent.z,
            scale: agent.visual_scale,
            color: group_color(agent.group),
        }
    }
}

pub fn group_color(group: Group) -> &'static str {
    match group {
        Group::Native => "#FFFF00",
        Group::LegalImmigrant => "#00FF00",
        Group::IllegalImmigrant => "#FF0000",
        Group::Outsider => "#990000",
    }
}

/// Fills exactly `slots` instances. Agents past the slot budget are not drawn.
pub fn render_instances(population: &Population, slots: usize) -> Vec<RenderInstance> {
    let mut instances: Vec<RenderInstance> = population
        .iter()
        .take(slots)
        .map(RenderInstance::from)
        .collect();
    instances.resize(slots, RenderInstance::hidden());
    instances
}

/// Only the instances for live agents, for consumers that size their own buffers.
pub fn visible_instances(population: &Population) -> Vec<RenderInstance> {
    population.iter().map(RenderInstance::from).collect()
}
