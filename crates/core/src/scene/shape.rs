use std::f32::consts::{PI, TAU};

use glam::Vec3;

/// Platonic solids used for wireframe shells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Solid {
    Tetrahedron,
    Octahedron,
    Icosahedron,
}

impl Solid {
    /// Vertices on the unit sphere.
    pub fn vertices(self) -> Vec<Vec3> {
        let raw: Vec<Vec3> = match self {
            Solid::Tetrahedron => vec![
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(-1.0, -1.0, 1.0),
                Vec3::new(-1.0, 1.0, -1.0),
                Vec3::new(1.0, -1.0, -1.0),
            ],
            Solid::Octahedron => vec![
                Vec3::X,
                Vec3::NEG_X,
                Vec3::Y,
                Vec3::NEG_Y,
                Vec3::Z,
                Vec3::NEG_Z,
            ],
            Solid::Icosahedron => {
                let phi = (1.0 + 5.0_f32.sqrt()) * 0.5;
                let mut points = Vec::with_capacity(12);
                for a in [-1.0, 1.0] {
                    for b in [-phi, phi] {
                        points.push(Vec3::new(0.0, a, b));
                        points.push(Vec3::new(a, b, 0.0));
                        points.push(Vec3::new(b, 0.0, a));
                    }
                }
                points
            }
        };
        raw.into_iter().map(Vec3::normalize).collect()
    }

    /// Vertex index pairs of every edge: pairs at the minimum vertex distance.
    pub fn edges(self) -> Vec<(usize, usize)> {
        let vertices = self.vertices();
        let mut shortest = f32::MAX;
        for (i, a) in vertices.iter().enumerate() {
            for b in &vertices[i + 1..] {
                shortest = shortest.min(a.distance(*b));
            }
        }

        let mut edges = Vec::new();
        for (i, a) in vertices.iter().enumerate() {
            for (j, b) in vertices.iter().enumerate().skip(i + 1) {
                if (a.distance(*b) - shortest).abs() < 1e-3 {
                    edges.push((i, j));
                }
            }
        }
        edges
    }
}

/// Geometry of one scene node in its local space. Flat shapes lie in the XY
/// plane.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Circle { radius: f32, segments: usize },
    /// Flat annulus; drawn as its two boundary circles.
    Ring { inner: f32, outer: f32, segments: usize },
    Polyline { points: Vec<Vec3>, closed: bool },
    /// Independent line segments.
    Segments { pairs: Vec<(Vec3, Vec3)> },
    Sphere { radius: f32, segments: usize },
    Polyhedron { solid: Solid, radius: f32 },
    Torus { radius: f32, tube: f32, segments: usize },
    /// Point sprites.
    Points { positions: Vec<Vec3>, size: f32 },
}

impl Shape {
    /// Regular polygon pointing up (or down) inscribed in `radius`.
    pub fn triangle(radius: f32, upward: bool) -> Self {
        let offset = if upward { PI / 2.0 } else { -PI / 2.0 };
        let points = (0..3)
            .map(|i| {
                let angle = offset + i as f32 * TAU / 3.0;
                Vec3::new(angle.cos() * radius, angle.sin() * radius, 0.0)
            })
            .collect();
        Shape::Polyline {
            points,
            closed: true,
        }
    }

    /// Arc of a circle centred at `center` from `start` to `end` radians.
    pub fn arc_points(center: Vec3, radius: f32, start: f32, end: f32, steps: usize) -> Vec<Vec3> {
        let steps = steps.max(1);
        (0..=steps)
            .map(|i| {
                let angle = start + (end - start) * i as f32 / steps as f32;
                center + Vec3::new(angle.cos() * radius, angle.sin() * radius, 0.0)
            })
            .collect()
    }

    pub fn uses_sprite(&self) -> bool {
        matches!(self, Shape::Points { .. })
    }

    /// Line strips approximating the shape, used by wireframe rasterizers.
    /// Point sprites have no outline.
    pub fn outlines(&self) -> Vec<Vec<Vec3>> {
        match self {
            Shape::Circle { radius, segments } => vec![circle(*radius, *segments)],
            Shape::Ring {
                inner,
                outer,
                segments,
            } => vec![circle(*inner, *segments), circle(*outer, *segments)],
            Shape::Polyline { points, closed } => {
                let mut strip = points.clone();
                if *closed {
                    if let Some(first) = points.first() {
                        strip.push(*first);
                    }
                }
                vec![strip]
            }
            Shape::Segments { pairs } => pairs.iter().map(|(a, b)| vec![*a, *b]).collect(),
            Shape::Sphere { radius, segments } => {
                let base = circle(*radius, *segments);
                vec![
                    base.clone(),
                    base.iter().map(|p| Vec3::new(p.x, 0.0, p.y)).collect(),
                    base.iter().map(|p| Vec3::new(0.0, p.y, p.x)).collect(),
                ]
            }
            Shape::Polyhedron { solid, radius } => {
                let vertices = solid.vertices();
                solid
                    .edges()
                    .into_iter()
                    .map(|(a, b)| vec![vertices[a] * *radius, vertices[b] * *radius])
                    .collect()
            }
            Shape::Torus {
                radius,
                tube,
                segments,
            } => torus_outlines(*radius, *tube, *segments),
            Shape::Points { .. } => Vec::new(),
        }
    }
}

fn circle(radius: f32, segments: usize) -> Vec<Vec3> {
    let segments = segments.max(3);
    (0..=segments)
        .map(|i| {
            let angle = i as f32 * TAU / segments as f32;
            Vec3::new(angle.cos() * radius, angle.sin() * radius, 0.0)
        })
        .collect()
}

fn torus_outlines(radius: f32, tube: f32, segments: usize) -> Vec<Vec<Vec3>> {
    let segments = segments.max(3);
    let mut strips = Vec::new();

    // Rings around the tube at regular angles of the main circle.
    for i in 0..segments {
        let u = i as f32 * TAU / segments as f32;
        let center = Vec3::new(u.cos() * radius, u.sin() * radius, 0.0);
        let outward = Vec3::new(u.cos(), u.sin(), 0.0);
        strips.push(
            (0..=12)
                .map(|j| {
                    let v = j as f32 * TAU / 12.0;
                    center + outward * (v.cos() * tube) + Vec3::Z * (v.sin() * tube)
                })
                .collect(),
        );
    }

    // Inner, outer and top silhouettes.
    for (offset, height) in [(-tube, 0.0), (tube, 0.0), (0.0, tube)] {
        let mut strip = circle(radius + offset, segments * 2);
        for point in &mut strip {
            point.z = height;
        }
        strips.push(strip);
    }
    strips
}
