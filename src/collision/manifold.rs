use crate::math::{Transform, Vec2};
use crate::settings::MAX_MANIFOLD_POINTS;

/// Which geometric feature of a shape produced a contact point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FeatureType {
    #[default]
    Vertex,
    Face,
}

/// Identifies a contact point by the features that intersect.
///
/// Used to match points across steps so accumulated impulses can be
/// carried forward for warm starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContactFeature {
    /// Feature index on shape A.
    pub index_a: u8,
    /// Feature index on shape B.
    pub index_b: u8,
    pub type_a: FeatureType,
    pub type_b: FeatureType,
}

impl ContactFeature {
    /// Swaps the roles of A and B.
    pub fn flipped(self) -> Self {
        Self {
            index_a: self.index_b,
            index_b: self.index_a,
            type_a: self.type_b,
            type_b: self.type_a,
        }
    }
}

pub type ContactId = ContactFeature;

/// A contact point in the manifold, stored in the local frame of the
/// incident shape so it stays valid while the bodies move.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ManifoldPoint {
    /// Usage depends on manifold kind:
    /// - Circles: the local center of circle B
    /// - FaceA: the local center of circle B or the clip point of polygon B
    /// - FaceB: the clip point of polygon A
    pub local_point: Vec2,
    /// Non-penetration impulse accumulated over the last step.
    pub normal_impulse: f64,
    /// Friction impulse accumulated over the last step.
    pub tangent_impulse: f64,
    pub id: ContactId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManifoldKind {
    #[default]
    Circles,
    FaceA,
    FaceB,
}

/// Contact points between two touching shapes, in local coordinates.
///
/// - Circles: `local_point` is the local center of circle A, `local_normal` unused
/// - FaceA: `local_point`/`local_normal` describe the reference face on shape A
/// - FaceB: `local_point`/`local_normal` describe the reference face on shape B
///
/// A manifold with zero points means the shapes are not touching.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Manifold {
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    pub local_normal: Vec2,
    pub local_point: Vec2,
    pub kind: ManifoldKind,
    pub point_count: usize,
}

impl Manifold {
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.point_count]
    }

    pub fn is_touching(&self) -> bool {
        self.point_count > 0
    }
}

/// Manifold evaluated in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorldManifold {
    /// World normal pointing from A to B.
    pub normal: Vec2,
    /// World contact points, midway between the two surfaces.
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    /// Negative when the shapes overlap.
    pub separations: [f64; MAX_MANIFOLD_POINTS],
    pub point_count: usize,
}

impl WorldManifold {
    pub fn new(
        manifold: &Manifold,
        xf_a: &Transform,
        radius_a: f64,
        xf_b: &Transform,
        radius_b: f64,
    ) -> Self {
        let mut wm = WorldManifold {
            point_count: manifold.point_count,
            ..Default::default()
        };
        if manifold.point_count == 0 {
            return wm;
        }

        match manifold.kind {
            ManifoldKind::Circles => {
                let point_a = xf_a.apply(manifold.local_point);
                let point_b = xf_b.apply(manifold.points[0].local_point);
                // Coincident centers fall back to the x axis.
                let mut normal = Vec2::X_AXIS;
                if point_a.distance_squared(point_b) > f64::EPSILON * f64::EPSILON {
                    normal = (point_b - point_a).normalize();
                }
                let c_a = point_a + normal * radius_a;
                let c_b = point_b - normal * radius_b;
                wm.normal = normal;
                wm.points[0] = (c_a + c_b) * 0.5;
                wm.separations[0] = (c_b - c_a).dot(normal);
            }
            ManifoldKind::FaceA => {
                let normal = xf_a.rotation.mul_vec(manifold.local_normal);
                let plane_point = xf_a.apply(manifold.local_point);
                for i in 0..manifold.point_count {
                    let clip_point = xf_b.apply(manifold.points[i].local_point);
                    let c_a = clip_point
                        + normal * (radius_a - (clip_point - plane_point).dot(normal));
                    let c_b = clip_point - normal * radius_b;
                    wm.points[i] = (c_a + c_b) * 0.5;
                    wm.separations[i] = (c_b - c_a).dot(normal);
                }
                wm.normal = normal;
            }
            ManifoldKind::FaceB => {
                let normal = xf_b.rotation.mul_vec(manifold.local_normal);
                let plane_point = xf_b.apply(manifold.local_point);
                for i in 0..manifold.point_count {
                    let clip_point = xf_a.apply(manifold.points[i].local_point);
                    let c_b = clip_point
                        + normal * (radius_b - (clip_point - plane_point).dot(normal));
                    let c_a = clip_point - normal * radius_a;
                    wm.points[i] = (c_a + c_b) * 0.5;
                    wm.separations[i] = (c_a - c_b).dot(normal);
                }
                // Ensure normal points from A to B.
                wm.normal = -normal;
            }
        }
        wm
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points[..self.point_count]
    }

    /// Deepest penetration depth, zero when not overlapping.
    pub fn depth(&self) -> f64 {
        self.separations[..self.point_count]
            .iter()
            .fold(0.0_f64, |acc, s| acc.max(-s))
    }
}

/// Vertex used while clipping the incident edge.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct ClipVertex {
    pub v: Vec2,
    pub id: ContactId,
}

/// Sutherland-Hodgman clip of a segment against the half-plane
/// `dot(normal, p) <= offset`. Returns the number of output points.
pub(crate) fn clip_segment_to_line(
    v_out: &mut [ClipVertex; 2],
    v_in: &[ClipVertex; 2],
    normal: Vec2,
    offset: f64,
    vertex_index_a: usize,
) -> usize {
    let mut count = 0;

    // Distance of the end points to the line.
    let distance0 = normal.dot(v_in[0].v) - offset;
    let distance1 = normal.dot(v_in[1].v) - offset;

    // Points behind the plane are kept.
    if distance0 <= 0.0 {
        v_out[count] = v_in[0];
        count += 1;
    }
    if distance1 <= 0.0 {
        v_out[count] = v_in[1];
        count += 1;
    }

    // The points are on different sides of the plane.
    if distance0 * distance1 < 0.0 {
        let interp = distance0 / (distance0 - distance1);
        v_out[count] = ClipVertex {
            v: v_in[0].v + (v_in[1].v - v_in[0].v) * interp,
            // VertexA is hitting edgeB.
            id: ContactFeature {
                index_a: vertex_index_a as u8,
                index_b: v_in[0].id.index_b,
                type_a: FeatureType::Vertex,
                type_b: FeatureType::Face,
            },
        };
        count += 1;
    }
    count
}
