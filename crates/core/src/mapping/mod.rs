//! Audio-reactive modulation: band energies in, scene parameter changes out.
//!
//! Each geometry variant has its own mapping function. Scale, opacity and
//! emissive values are computed from the current tick's bands only; rotation
//! is the one integrated quantity, as a per-second rate times the tick's
//! elapsed time, so it only ever advances in the direction of its rate.

use std::f32::consts::TAU;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{
    config::PrimeConfig,
    prime::PrimePulse,
    scene::{NodeId, NodeRole, SceneGraph, SceneModifier},
    BandEnergy, GeometryVariant,
};

/// How strongly treble drives emissive intensity on every node.
const TREBLE_GLOW: f32 = 1.2;

/// What a [`ParameterUpdate`] applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The graph's root transform.
    Root,
    Node(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Change {
    /// Replaces the scale.
    Scale(Vec3),
    /// Added to the accumulated Euler rotation.
    Rotate(Vec3),
    Opacity(f32),
    Emissive(f32),
}

/// Concrete value routed to a scene parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterUpdate {
    pub target: Target,
    pub change: Change,
}

impl ParameterUpdate {
    pub fn node(id: NodeId, change: Change) -> Self {
        Self {
            target: Target::Node(id),
            change,
        }
    }

    pub fn root(change: Change) -> Self {
        Self {
            target: Target::Root,
            change,
        }
    }
}

/// Inputs for one modulation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModulationInput {
    pub bands: BandEnergy,
    /// Seconds since the previous tick.
    pub dt: f32,
    pub pulse: Option<PrimePulse>,
}

/// Shape of the prime-active pulse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseShape {
    pub frequency_hz: f32,
    pub amplitude: f32,
    pub emissive_boost: f32,
}

impl From<&PrimeConfig> for PulseShape {
    fn from(config: &PrimeConfig) -> Self {
        Self {
            frequency_hz: config.pulse_hz,
            amplitude: config.pulse_amplitude,
            emissive_boost: config.emissive_boost,
        }
    }
}

impl PulseShape {
    /// Central modifier for a pulse; identity when no pulse is active.
    pub fn modifier(&self, pulse: Option<PrimePulse>) -> SceneModifier {
        let Some(pulse) = pulse else {
            return SceneModifier::IDENTITY;
        };
        let wave = (TAU * self.frequency_hz * pulse.elapsed).sin().abs();
        SceneModifier {
            pulse_scale: Some(1.0 + self.amplitude * pulse.strength * wave),
            emissive_boost: self.emissive_boost * pulse.strength,
        }
    }
}

/// Maps band energies onto the active scene graph each tick.
#[derive(Debug, Clone)]
pub struct AudioReactiveModulator {
    pulse: PulseShape,
    updates: Vec<ParameterUpdate>,
}

impl AudioReactiveModulator {
    pub fn new(pulse: PulseShape) -> Self {
        Self {
            pulse,
            updates: Vec::with_capacity(64),
        }
    }

    /// Updates produced by the last [`AudioReactiveModulator::modulate`] call.
    pub fn updates(&self) -> &[ParameterUpdate] {
        &self.updates
    }

    /// Computes the variant's updates, applies them and sets the central
    /// prime-active modifier.
    pub fn modulate(
        &mut self,
        variant: GeometryVariant,
        graph: &mut SceneGraph,
        input: &ModulationInput,
    ) -> &[ParameterUpdate] {
        self.updates.clear();
        let bands = sanitize(input.bands);
        let dt = if input.dt.is_finite() { input.dt.max(0.0) } else { 0.0 };
        let mut out = Updates {
            graph: &*graph,
            updates: &mut self.updates,
            dt,
        };

        match variant {
            GeometryVariant::FlowerOfLife => flower_of_life(&mut out, &bands),
            GeometryVariant::Merkaba => merkaba(&mut out, &bands),
            GeometryVariant::TorusField => torus_field(&mut out, &bands),
            GeometryVariant::VesicaPiscis => vesica_piscis(&mut out, &bands),
            GeometryVariant::SriYantra => sri_yantra(&mut out, &bands),
            GeometryVariant::FractalNest => fractal_nest(&mut out, &bands),
        }
        out.glow(bands.treble);

        graph.apply_updates(&self.updates);
        graph.set_modifier(self.pulse.modifier(input.pulse));
        &self.updates
    }
}

impl Default for AudioReactiveModulator {
    fn default() -> Self {
        Self::new(PulseShape::from(&PrimeConfig::default()))
    }
}

fn sanitize(bands: BandEnergy) -> BandEnergy {
    let clean = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
    BandEnergy {
        bass: clean(bands.bass),
        mid_low: clean(bands.mid_low),
        mid_high: clean(bands.mid_high),
        treble: clean(bands.treble),
    }
}

/// Collects updates for one graph. Rotation rates are radians per second.
struct Updates<'a> {
    graph: &'a SceneGraph,
    updates: &'a mut Vec<ParameterUpdate>,
    dt: f32,
}

impl Updates<'_> {
    fn ids(&self, role: NodeRole) -> Vec<NodeId> {
        self.graph.ids_with(role).collect()
    }

    fn scale(&mut self, role: NodeRole, scale: Vec3) {
        for id in self.ids(role) {
            let base = self.graph.nodes()[id.0].base_scale;
            self.updates
                .push(ParameterUpdate::node(id, Change::Scale(base * scale)));
        }
    }

    fn uniform(&mut self, role: NodeRole, factor: f32) {
        self.scale(role, Vec3::splat(factor));
    }

    fn spin(&mut self, role: NodeRole, rate: Vec3) {
        for id in self.ids(role) {
            self.updates
                .push(ParameterUpdate::node(id, Change::Rotate(rate * self.dt)));
        }
    }

    fn spin_root(&mut self, rate: Vec3) {
        self.updates
            .push(ParameterUpdate::root(Change::Rotate(rate * self.dt)));
    }

    /// Opacity as a fraction of the node's built opacity.
    fn fade(&mut self, role: NodeRole, level: f32) {
        for id in self.ids(role) {
            let base = self.graph.nodes()[id.0].base_opacity;
            self.updates
                .push(ParameterUpdate::node(id, Change::Opacity(base * level)));
        }
    }

    /// Emissive intensity of every node, proportional to treble.
    fn glow(&mut self, treble: f32) {
        for (index, node) in self.graph.nodes().iter().enumerate() {
            self.updates.push(ParameterUpdate::node(
                NodeId(index),
                Change::Emissive(node.base_emissive + treble * TREBLE_GLOW),
            ));
        }
    }
}

fn flower_of_life(out: &mut Updates<'_>, b: &BandEnergy) {
    out.uniform(NodeRole::Center, 1.0 + b.bass * 0.3);
    out.uniform(NodeRole::Ring(1), 1.0 + b.mid_low * 0.25);
    out.uniform(NodeRole::Ring(2), 1.0 + b.mid_high * 0.2);
    out.uniform(NodeRole::Nucleus, 1.0 + b.bass * 0.6);
    out.fade(NodeRole::Edge, 0.3 + b.treble * 0.7);
    out.spin_root(Vec3::Z * (0.1 + b.mid_low * 0.6));
}

fn merkaba(out: &mut Updates<'_>, b: &BandEnergy) {
    let rate = 0.3 + b.bass * 1.5;
    out.spin(NodeRole::TetraUp, Vec3::Y * rate);
    out.spin(NodeRole::TetraDown, Vec3::Y * -rate);
    out.uniform(NodeRole::InnerSphere, 1.0 + b.mid_low * 0.5);
    let ring = 1.0 + b.mid_high * 0.3;
    out.scale(NodeRole::OuterRing, Vec3::new(ring, ring, 1.0));
    out.spin(NodeRole::OuterRing, Vec3::Z * (0.1 + b.mid_high * 0.5));
}

fn torus_field(out: &mut Updates<'_>, b: &BandEnergy) {
    let swell = 1.0 + b.bass * 0.25;
    let torus_scale = Vec3::new(swell, swell, 1.0 + b.mid_low * 0.4);
    let rate = Vec3::new(0.2 + b.bass, 0.15 + b.mid_low * 0.5, 0.0);
    out.scale(NodeRole::Torus, torus_scale);
    out.spin(NodeRole::Torus, rate);
    out.scale(NodeRole::Overlay, torus_scale);
    out.spin(NodeRole::Overlay, -rate);
    out.uniform(NodeRole::InnerSphere, 1.0 + b.mid_high * 0.6);
    out.spin(NodeRole::Halo, Vec3::Y * (0.05 + b.treble * 0.5));
    out.fade(NodeRole::Halo, 0.2 + b.treble * 0.8);
}

fn vesica_piscis(out: &mut Updates<'_>, b: &BandEnergy) {
    out.uniform(NodeRole::Circle(0), 1.0 + b.bass * 0.2);
    out.uniform(NodeRole::Circle(1), 1.0 + b.bass * 0.2);
    out.uniform(NodeRole::Lens, 1.0 + b.mid_low * 0.3);
    out.fade(NodeRole::Lens, 0.4 + b.mid_high * 0.6);
    out.uniform(NodeRole::Point, 1.0 + b.treble);
    out.spin_root(Vec3::Z * (0.05 + b.mid_low * 0.3));
}

fn sri_yantra(out: &mut Updates<'_>, b: &BandEnergy) {
    let triangles: Vec<(NodeId, u8, bool)> = out
        .graph
        .nodes()
        .iter()
        .enumerate()
        .filter_map(|(i, node)| match node.role {
            NodeRole::Triangle { index, upward } => Some((NodeId(i), index, upward)),
            _ => None,
        })
        .collect();
    let count = triangles.len().max(1) as f32;
    let rate = 0.05 + b.mid_low * 0.4;
    for (id, index, upward) in triangles {
        // Outer triangles breathe less than inner ones.
        let depth = 1.0 - index as f32 / count;
        let base = out.graph.nodes()[id.0].base_scale;
        let direction = if upward { 1.0 } else { -1.0 };
        out.updates.push(ParameterUpdate::node(
            id,
            Change::Scale(base * (1.0 + b.bass * 0.15 * depth)),
        ));
        out.updates.push(ParameterUpdate::node(
            id,
            Change::Rotate(Vec3::Z * direction * rate * out.dt),
        ));
    }
    out.uniform(NodeRole::OuterRing, 1.0 + b.mid_high * 0.1);
    out.uniform(NodeRole::Petal, 1.0 + b.treble * 0.2);
    out.fade(NodeRole::Petal, 0.3 + b.treble * 0.7);
    out.uniform(NodeRole::Point, 1.0 + b.bass * 0.8);
}

fn fractal_nest(out: &mut Updates<'_>, b: &BandEnergy) {
    out.uniform(NodeRole::Shell(0), 1.0 + b.bass * 0.3);
    out.spin(NodeRole::Shell(0), Vec3::new(0.1, 0.2 + b.bass, 0.0));
    out.uniform(NodeRole::Shell(1), 1.0 + b.mid_low * 0.3);
    out.spin(NodeRole::Shell(1), Vec3::new(-(0.15 + b.mid_low), 0.0, 0.1));
    out.uniform(NodeRole::Shell(2), 1.0 + b.mid_high * 0.3);
    out.spin(NodeRole::Shell(2), Vec3::new(0.0, -(0.25 + b.mid_high), 0.2));
    out.spin(NodeRole::Halo, Vec3::Y * (0.05 + b.treble * 0.5));
    out.fade(NodeRole::Halo, 0.2 + b.treble * 0.8);
}
