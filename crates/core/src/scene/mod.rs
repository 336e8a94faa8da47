//! Scene graph produced by the geometry catalog and mutated by the modulator.

pub mod color;
pub mod shape;

use glam::{EulerRot, Mat4, Quat, Vec3};
use tracing::{debug, warn};

use crate::{
    mapping::{Change, ParameterUpdate, Target},
    render::{RenderBackend, ResourceCounts, ResourceId, ResourceKind},
    GeometryVariant,
};

pub use color::{ColorContext, Rgb, THEMES};
pub use shape::{Shape, Solid};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Euler angles in radians, applied X then Y then Z.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn matrix_with_scale(&self, scale: Vec3) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Mat4::from_scale_rotation_translation(scale, rotation, self.position)
    }

    pub fn matrix(&self) -> Mat4 {
        self.matrix_with_scale(self.scale)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub color: Rgb,
    pub emissive: Rgb,
    pub emissive_intensity: f32,
    pub opacity: f32,
    pub wireframe: bool,
}

impl Material {
    pub fn solid(color: Rgb, emissive: Rgb, emissive_intensity: f32) -> Self {
        Self {
            color,
            emissive,
            emissive_intensity,
            opacity: 1.0,
            wireframe: false,
        }
    }

    pub fn wire(color: Rgb, opacity: f32) -> Self {
        Self {
            color,
            emissive: color,
            emissive_intensity: 0.2,
            opacity,
            wireframe: true,
        }
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }
}

/// What a node represents inside its variant; the modulator addresses nodes
/// through these roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    Center,
    Ring(u8),
    Edge,
    Nucleus,
    TetraUp,
    TetraDown,
    InnerSphere,
    OuterRing,
    Torus,
    Overlay,
    Halo,
    Circle(u8),
    Lens,
    Point,
    Triangle { index: u8, upward: bool },
    Petal,
    Shell(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub role: NodeRole,
    pub shape: Shape,
    pub transform: Transform,
    pub material: Material,
    /// Scale, opacity and emissive intensity the node was built with.
    pub base_scale: Vec3,
    pub base_opacity: f32,
    pub base_emissive: f32,
}

impl SceneNode {
    pub fn new(
        name: impl Into<String>,
        role: NodeRole,
        shape: Shape,
        transform: Transform,
        material: Material,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            shape,
            base_scale: transform.scale,
            base_opacity: material.opacity,
            base_emissive: material.emissive_intensity,
            transform,
            material,
        }
    }

    pub fn resource_counts(&self) -> ResourceCounts {
        ResourceCounts {
            geometries: 1,
            materials: 1,
            textures: usize::from(self.shape.uses_sprite()),
        }
    }
}

/// Graph-wide modifier applied on top of every node at draw time. The
/// prime-active pulse goes through here instead of touching nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneModifier {
    /// When set, replaces each node's modulated scale with
    /// `base_scale * pulse_scale`.
    pub pulse_scale: Option<f32>,
    pub emissive_boost: f32,
}

impl SceneModifier {
    pub const IDENTITY: Self = Self {
        pulse_scale: None,
        emissive_boost: 0.0,
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for SceneModifier {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneGraph {
    label: &'static str,
    pub root: Transform,
    nodes: Vec<SceneNode>,
    modifier: SceneModifier,
}

impl SceneGraph {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            root: Transform::IDENTITY,
            nodes: Vec::new(),
            modifier: SceneModifier::IDENTITY,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn push(&mut self, node: SceneNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids_with(&self, role: NodeRole) -> impl Iterator<Item = NodeId> + '_ {
        self.ids_where(move |r| r == role)
    }

    pub fn ids_where<F>(&self, mut predicate: F) -> impl Iterator<Item = NodeId> + '_
    where
        F: FnMut(NodeRole) -> bool + 'static,
    {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, node)| predicate(node.role))
            .map(|(index, _)| NodeId(index))
    }

    pub fn count_role(&self, role: NodeRole) -> usize {
        self.ids_with(role).count()
    }

    pub fn modifier(&self) -> SceneModifier {
        self.modifier
    }

    pub fn set_modifier(&mut self, modifier: SceneModifier) {
        self.modifier = modifier;
    }

    /// Applies modulator output. Scale, opacity and emissive changes replace
    /// the current value; rotation changes are deltas and accumulate.
    pub fn apply_updates(&mut self, updates: &[ParameterUpdate]) {
        for update in updates {
            let transform = match update.target {
                Target::Root => &mut self.root,
                Target::Node(id) => match self.nodes.get_mut(id.0) {
                    Some(node) => match update.change {
                        Change::Opacity(value) => {
                            node.material.opacity = value.clamp(0.0, 1.0);
                            continue;
                        }
                        Change::Emissive(value) => {
                            node.material.emissive_intensity = value.max(0.0);
                            continue;
                        }
                        _ => &mut node.transform,
                    },
                    None => continue,
                },
            };

            match update.change {
                Change::Scale(scale) => transform.scale = scale,
                Change::Rotate(delta) => transform.rotation += delta,
                Change::Opacity(_) | Change::Emissive(_) => {}
            }
        }
    }

    /// Scale a node is drawn with once the modifier is taken into account.
    pub fn effective_scale(&self, id: NodeId) -> Vec3 {
        let Some(node) = self.node(id) else {
            return Vec3::ZERO;
        };
        match self.modifier.pulse_scale {
            Some(pulse) => node.base_scale * pulse,
            None => node.transform.scale,
        }
    }

    pub fn effective_emissive(&self, id: NodeId) -> f32 {
        self.node(id)
            .map(|node| node.material.emissive_intensity + self.modifier.emissive_boost)
            .unwrap_or(0.0)
    }

    /// Local-to-world matrix of a node.
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let Some(node) = self.node(id) else {
            return Mat4::IDENTITY;
        };
        self.root.matrix() * node.transform.matrix_with_scale(self.effective_scale(id))
    }

    /// Resources the graph needs once attached to a backend.
    pub fn resource_counts(&self) -> ResourceCounts {
        self.nodes
            .iter()
            .map(SceneNode::resource_counts)
            .fold(ResourceCounts::default(), |acc, c| acc + c)
    }
}

/// A scene graph whose geometries, materials and textures are allocated on a
/// render backend. Must be disposed on the backend that holds its resources.
#[derive(Debug)]
pub struct LiveScene {
    variant: GeometryVariant,
    graph: SceneGraph,
    resources: Vec<ResourceId>,
    disposed: bool,
}

impl LiveScene {
    pub fn attach(
        variant: GeometryVariant,
        graph: SceneGraph,
        backend: &mut dyn RenderBackend,
    ) -> Self {
        let mut scene = Self {
            variant,
            graph,
            resources: Vec::new(),
            disposed: false,
        };
        scene.acquire(backend);
        debug!(
            variant = %variant,
            nodes = scene.graph.len(),
            resources = scene.resources.len(),
            "scene attached"
        );
        scene
    }

    fn acquire(&mut self, backend: &mut dyn RenderBackend) {
        for node in &self.graph.nodes {
            self.resources.push(backend.allocate(ResourceKind::Geometry));
            self.resources.push(backend.allocate(ResourceKind::Material));
            if node.shape.uses_sprite() {
                self.resources.push(backend.allocate(ResourceKind::Texture));
            }
        }
    }

    fn release(&mut self, backend: &mut dyn RenderBackend) -> usize {
        let mut released = 0;
        for id in self.resources.drain(..) {
            if backend.release(id) {
                released += 1;
            }
        }
        released
    }

    /// Moves every resource from one backend to another, keeping the graph
    /// and its animation state.
    pub fn rebind(&mut self, from: &mut dyn RenderBackend, to: &mut dyn RenderBackend) {
        if self.disposed {
            return;
        }
        self.release(from);
        self.acquire(to);
    }

    /// Releases every resource. Calling it again is a logged no-op.
    pub fn dispose(&mut self, backend: &mut dyn RenderBackend) -> usize {
        if self.disposed {
            debug!(variant = %self.variant, "scene already disposed");
            return 0;
        }
        let released = self.release(backend);
        self.disposed = true;
        debug!(variant = %self.variant, released, "scene disposed");
        released
    }

    pub fn variant(&self) -> GeometryVariant {
        self.variant
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Drop for LiveScene {
    fn drop(&mut self) {
        if !self.disposed && !self.resources.is_empty() {
            warn!(
                variant = %self.variant,
                leaked = self.resources.len(),
                "live scene dropped without dispose"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessBackend;

    fn sample_graph() -> SceneGraph {
        let colors = ColorContext::default();
        let mut graph = SceneGraph::new("sample");
        graph.push(SceneNode::new(
            "circle",
            NodeRole::Center,
            Shape::Circle {
                radius: 1.0,
                segments: 16,
            },
            Transform::IDENTITY,
            Material::solid(colors.base, colors.emissive, 0.3),
        ));
        graph.push(SceneNode::new(
            "halo",
            NodeRole::Halo,
            Shape::Points {
                positions: vec![Vec3::X],
                size: 0.02,
            },
            Transform::IDENTITY,
            Material::wire(colors.accent, 0.5),
        ));
        graph
    }

    #[test]
    fn rotation_accumulates_and_scale_replaces() {
        let mut graph = sample_graph();
        let id = NodeId(0);
        let updates = [
            ParameterUpdate::node(id, Change::Rotate(Vec3::Z * 0.1)),
            ParameterUpdate::node(id, Change::Scale(Vec3::splat(1.5))),
        ];
        graph.apply_updates(&updates);
        graph.apply_updates(&updates);

        let node = graph.node(id).unwrap();
        assert!((node.transform.rotation.z - 0.2).abs() < 1e-6);
        assert_eq!(node.transform.scale, Vec3::splat(1.5));
    }

    #[test]
    fn modifier_overrides_scale_and_boosts_emissive() {
        let mut graph = sample_graph();
        graph.apply_updates(&[ParameterUpdate::node(
            NodeId(0),
            Change::Scale(Vec3::splat(2.0)),
        )]);
        graph.set_modifier(SceneModifier {
            pulse_scale: Some(1.2),
            emissive_boost: 1.0,
        });

        assert_eq!(graph.effective_scale(NodeId(0)), Vec3::splat(1.2));
        assert!((graph.effective_emissive(NodeId(0)) - 1.3).abs() < 1e-6);

        graph.set_modifier(SceneModifier::IDENTITY);
        assert_eq!(graph.effective_scale(NodeId(0)), Vec3::splat(2.0));
    }

    #[test]
    fn sprite_nodes_need_a_texture() {
        let counts = sample_graph().resource_counts();
        assert_eq!(counts.geometries, 2);
        assert_eq!(counts.materials, 2);
        assert_eq!(counts.textures, 1);
    }

    #[test]
    fn dispose_releases_everything_once() {
        let mut backend = HeadlessBackend::new();
        let mut scene = LiveScene::attach(
            GeometryVariant::FlowerOfLife,
            sample_graph(),
            &mut backend,
        );
        assert_eq!(backend.live_resources().total(), 5);

        assert_eq!(scene.dispose(&mut backend), 5);
        assert_eq!(scene.dispose(&mut backend), 0);
        assert_eq!(backend.live_resources().total(), 0);
    }

    #[test]
    fn rebind_moves_resources_between_backends() {
        let mut first = HeadlessBackend::new();
        let mut second = HeadlessBackend::new();
        let mut scene = LiveScene::attach(GeometryVariant::Merkaba, sample_graph(), &mut first);

        scene.rebind(&mut first, &mut second);
        assert_eq!(first.live_resources().total(), 0);
        assert_eq!(second.live_resources().total(), 5);
        scene.dispose(&mut second);
    }
}
