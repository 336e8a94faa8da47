//! Constructors for the built-in geometry variants. Each one is a pure
//! function of its palette.

use std::f32::consts::{FRAC_PI_3, PI, TAU};

use glam::Vec3;

use crate::scene::{
    ColorContext, Material, NodeRole, SceneGraph, SceneNode, Shape, Solid, Transform,
};

const CIRCLE_SEGMENTS: usize = 64;
const SPHERE_SEGMENTS: usize = 24;
const HALO_POINTS: usize = 180;

fn polar(radius: f32, angle: f32) -> Vec3 {
    Vec3::new(angle.cos() * radius, angle.sin() * radius, 0.0)
}

fn circle(radius: f32) -> Shape {
    Shape::Circle {
        radius,
        segments: CIRCLE_SEGMENTS,
    }
}

fn sphere(radius: f32) -> Shape {
    Shape::Sphere {
        radius,
        segments: SPHERE_SEGMENTS,
    }
}

/// Points spread evenly over a sphere shell using the golden angle.
fn halo(radius: f32, count: usize) -> Shape {
    let golden = PI * (3.0 - 5.0_f32.sqrt());
    let positions = (0..count)
        .map(|i| {
            let y = 1.0 - 2.0 * (i as f32 + 0.5) / count as f32;
            let ring = (1.0 - y * y).sqrt();
            let theta = golden * i as f32;
            Vec3::new(theta.cos() * ring, y, theta.sin() * ring) * radius
        })
        .collect();
    Shape::Points {
        positions,
        size: 0.025,
    }
}

pub(super) fn flower_of_life(colors: &ColorContext) -> SceneGraph {
    let radius = 0.5;
    let mut graph = SceneGraph::new("flower-of-life");
    let line = Material::solid(colors.base, colors.emissive, 0.3);

    graph.push(SceneNode::new(
        "center",
        NodeRole::Center,
        circle(radius),
        Transform::IDENTITY,
        line,
    ));

    let ring1: Vec<Vec3> = (0..6)
        .map(|i| polar(radius, i as f32 * FRAC_PI_3))
        .collect();
    for (i, center) in ring1.iter().enumerate() {
        graph.push(SceneNode::new(
            format!("ring1-{i}"),
            NodeRole::Ring(1),
            circle(radius),
            Transform::at(*center),
            line,
        ));
    }

    // Second ring: six circles on the axes at 2r and six between them at r√3.
    let mut ring2 = Vec::with_capacity(12);
    for i in 0..6 {
        let angle = i as f32 * FRAC_PI_3;
        ring2.push(polar(2.0 * radius, angle));
        ring2.push(polar(3.0_f32.sqrt() * radius, angle + FRAC_PI_3 / 2.0));
    }
    let accent = Material::solid(colors.accent, colors.emissive, 0.2).with_opacity(0.8);
    for (i, center) in ring2.iter().enumerate() {
        graph.push(SceneNode::new(
            format!("ring2-{i}"),
            NodeRole::Ring(2),
            circle(radius),
            Transform::at(*center),
            accent,
        ));
    }

    let mut pairs = Vec::with_capacity(36);
    for (i, point) in ring1.iter().enumerate() {
        pairs.push((Vec3::ZERO, *point));
        pairs.push((*point, ring1[(i + 1) % ring1.len()]));
    }
    for outer in &ring2 {
        for inner in &ring1 {
            if inner.distance(*outer) <= radius * 1.01 {
                pairs.push((*inner, *outer));
            }
        }
    }
    graph.push(SceneNode::new(
        "edges",
        NodeRole::Edge,
        Shape::Segments { pairs },
        Transform::IDENTITY,
        Material::wire(colors.accent, 0.6),
    ));

    graph.push(SceneNode::new(
        "nucleus",
        NodeRole::Nucleus,
        sphere(0.12),
        Transform::IDENTITY,
        Material::solid(colors.emissive, colors.emissive, 0.8),
    ));
    graph
}

pub(super) fn merkaba(colors: &ColorContext) -> SceneGraph {
    let mut graph = SceneGraph::new("merkaba");
    graph.push(SceneNode::new(
        "tetra-up",
        NodeRole::TetraUp,
        Shape::Polyhedron {
            solid: Solid::Tetrahedron,
            radius: 1.2,
        },
        Transform::IDENTITY,
        Material::wire(colors.base, 0.9),
    ));
    // A quarter turn about Z maps the tetrahedron onto its point inversion,
    // giving the star tetrahedron.
    graph.push(SceneNode::new(
        "tetra-down",
        NodeRole::TetraDown,
        Shape::Polyhedron {
            solid: Solid::Tetrahedron,
            radius: 1.2,
        },
        Transform::IDENTITY.with_rotation(Vec3::new(0.0, 0.0, PI / 2.0)),
        Material::wire(colors.accent, 0.9),
    ));
    graph.push(SceneNode::new(
        "inner-sphere",
        NodeRole::InnerSphere,
        sphere(0.35),
        Transform::IDENTITY,
        Material::solid(colors.emissive, colors.emissive, 0.6).with_opacity(0.7),
    ));
    graph.push(SceneNode::new(
        "outer-ring",
        NodeRole::OuterRing,
        Shape::Ring {
            inner: 1.45,
            outer: 1.5,
            segments: CIRCLE_SEGMENTS * 2,
        },
        Transform::IDENTITY,
        Material::solid(colors.accent, colors.emissive, 0.3).with_opacity(0.8),
    ));
    graph
}

pub(super) fn torus_field(colors: &ColorContext) -> SceneGraph {
    let mut graph = SceneGraph::new("torus-field");
    let torus = Shape::Torus {
        radius: 1.0,
        tube: 0.35,
        segments: 32,
    };
    graph.push(SceneNode::new(
        "torus",
        NodeRole::Torus,
        torus.clone(),
        Transform::IDENTITY,
        Material::solid(colors.base, colors.emissive, 0.3),
    ));
    let mut overlay = Transform::IDENTITY;
    overlay.scale = Vec3::splat(1.02);
    graph.push(SceneNode::new(
        "wireframe",
        NodeRole::Overlay,
        torus,
        overlay,
        Material::wire(colors.accent, 0.5),
    ));
    graph.push(SceneNode::new(
        "inner-sphere",
        NodeRole::InnerSphere,
        sphere(0.3),
        Transform::IDENTITY,
        Material::solid(colors.emissive, colors.emissive, 0.7),
    ));
    graph.push(SceneNode::new(
        "halo",
        NodeRole::Halo,
        halo(1.8, HALO_POINTS),
        Transform::IDENTITY,
        Material::wire(colors.emissive, 0.6),
    ));
    graph
}

pub(super) fn vesica_piscis(colors: &ColorContext) -> SceneGraph {
    let radius = 1.0;
    let offset = radius / 2.0;
    let mut graph = SceneGraph::new("vesica-piscis");

    for (i, x) in [-offset, offset].into_iter().enumerate() {
        graph.push(SceneNode::new(
            format!("circle-{i}"),
            NodeRole::Circle(i as u8),
            circle(radius),
            Transform::at(Vec3::new(x, 0.0, 0.0)),
            Material::solid(colors.base, colors.emissive, 0.3),
        ));
    }

    // The lens is bounded by the right arc of the left circle and the left
    // arc of the right circle; both meet at x = 0.
    let mut lens = Shape::arc_points(
        Vec3::new(-offset, 0.0, 0.0),
        radius,
        -FRAC_PI_3,
        FRAC_PI_3,
        24,
    );
    lens.extend(
        Shape::arc_points(
            Vec3::new(offset, 0.0, 0.0),
            radius,
            2.0 * FRAC_PI_3,
            4.0 * FRAC_PI_3,
            24,
        )
        .into_iter()
        .skip(1),
    );
    lens.pop();
    graph.push(SceneNode::new(
        "lens",
        NodeRole::Lens,
        Shape::Polyline {
            points: lens,
            closed: true,
        },
        Transform::IDENTITY,
        Material::solid(colors.accent, colors.emissive, 0.5),
    ));

    graph.push(SceneNode::new(
        "point",
        NodeRole::Point,
        sphere(0.05),
        Transform::IDENTITY,
        Material::solid(colors.emissive, colors.emissive, 1.0),
    ));
    graph
}

pub(super) fn sri_yantra(colors: &ColorContext) -> SceneGraph {
    let mut graph = SceneGraph::new("sri-yantra");

    // Nine interlocking triangles, five pointing down and four up.
    let count = 9;
    for i in 0..count {
        let upward = i % 2 == 1;
        let radius = 1.2 - i as f32 * 0.11;
        let material = if upward {
            Material::solid(colors.base, colors.emissive, 0.3)
        } else {
            Material::solid(colors.accent, colors.emissive, 0.3)
        };
        let mut transform = Transform::IDENTITY;
        transform.position.y = if upward { -0.04 } else { 0.04 } * (i as f32 / 2.0);
        graph.push(SceneNode::new(
            format!("triangle-{i}"),
            NodeRole::Triangle {
                index: i as u8,
                upward,
            },
            Shape::triangle(radius, upward),
            transform,
            material,
        ));
    }

    for (i, radius) in [1.35, 1.45, 1.55].into_iter().enumerate() {
        graph.push(SceneNode::new(
            format!("ring-{i}"),
            NodeRole::OuterRing,
            circle(radius),
            Transform::IDENTITY,
            Material::wire(colors.accent, 0.7),
        ));
    }

    for (ring, (count, radius, length)) in [(8usize, 1.35_f32, 0.3_f32), (16, 1.55, 0.25)]
        .into_iter()
        .enumerate()
    {
        for i in 0..count {
            let angle = i as f32 * TAU / count as f32;
            let width = PI / count as f32 * 0.8;
            let base_left = polar(radius, angle - width);
            let base_right = polar(radius, angle + width);
            let mid_left = polar(radius + length * 0.6, angle - width * 0.8);
            let mid_right = polar(radius + length * 0.6, angle + width * 0.8);
            let tip = polar(radius + length, angle);
            graph.push(SceneNode::new(
                format!("petal-{ring}-{i}"),
                NodeRole::Petal,
                Shape::Polyline {
                    points: vec![base_left, mid_left, tip, mid_right, base_right],
                    closed: false,
                },
                Transform::IDENTITY,
                Material::wire(colors.emissive, 0.6),
            ));
        }
    }

    graph.push(SceneNode::new(
        "bindu",
        NodeRole::Point,
        sphere(0.04),
        Transform::IDENTITY,
        Material::solid(colors.emissive, colors.emissive, 1.0),
    ));
    graph
}

pub(super) fn fractal_nest(colors: &ColorContext) -> SceneGraph {
    let mut graph = SceneGraph::new("fractal-nest");
    let shells = [
        (Solid::Icosahedron, 1.5, colors.base),
        (Solid::Octahedron, 1.0, colors.accent),
        (Solid::Tetrahedron, 0.55, colors.emissive),
    ];
    for (i, (solid, radius, color)) in shells.into_iter().enumerate() {
        graph.push(SceneNode::new(
            format!("shell-{i}"),
            NodeRole::Shell(i as u8),
            Shape::Polyhedron { solid, radius },
            Transform::IDENTITY,
            Material::wire(color, 0.9 - i as f32 * 0.1),
        ));
    }
    graph.push(SceneNode::new(
        "halo",
        NodeRole::Halo,
        halo(2.0, HALO_POINTS),
        Transform::IDENTITY,
        Material::wire(colors.emissive, 0.5),
    ));
    graph
}
