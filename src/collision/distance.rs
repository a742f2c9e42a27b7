//! GJK closest points between convex proxies.

use crate::math::{Transform, Vec2};
use crate::settings::{MAX_GJK_ITERATIONS, MAX_POLYGON_VERTICES};
use crate::shapes::Shape;

/// Convex vertex set plus skin radius, as seen by GJK.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceProxy {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
    pub radius: f64,
}

impl DistanceProxy {
    /// Proxy for one child of a shape.
    pub fn new(shape: &Shape, child_index: usize) -> Self {
        match shape {
            Shape::Circle(c) => Self::from_vertices(&[c.position], c.radius),
            Shape::Polygon(p) => Self::from_vertices(&p.vertices, p.radius),
            Shape::Edge(e) => Self::from_vertices(&[e.vertex1, e.vertex2], e.radius),
            Shape::Chain(c) => {
                let edge = c.child_edge(child_index);
                Self::from_vertices(&[edge.vertex1, edge.vertex2], edge.radius)
            }
        }
    }

    /// Proxy from an explicit vertex list. Extra vertices past the maximum are ignored.
    pub fn from_vertices(points: &[Vec2], radius: f64) -> Self {
        let count = points.len().min(MAX_POLYGON_VERTICES);
        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        vertices[..count].copy_from_slice(&points[..count]);
        Self {
            vertices,
            count,
            radius,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.count
    }

    pub fn vertex(&self, index: usize) -> Vec2 {
        debug_assert!(index < self.count);
        self.vertices[index]
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    /// Index of the vertex farthest along `d`.
    pub fn support(&self, d: Vec2) -> usize {
        let mut best_index = 0;
        let mut best_value = self.vertices[0].dot(d);
        for (i, v) in self.vertices().iter().enumerate().skip(1) {
            let value = v.dot(d);
            if value > best_value {
                best_index = i;
                best_value = value;
            }
        }
        best_index
    }
}

/// Simplex from a previous query, used to warm start the next one.
///
/// Callers own the cache and pass it explicitly; a zeroed cache starts cold.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimplexCache {
    /// Length or area of the cached simplex.
    pub metric: f64,
    pub count: usize,
    pub index_a: [usize; 3],
    pub index_b: [usize; 3],
}

#[derive(Debug, Clone, Copy)]
pub struct DistanceInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub transform_a: Transform,
    pub transform_b: Transform,
    pub use_radii: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceOutput {
    /// Closest point on shape A.
    pub point_a: Vec2,
    /// Closest point on shape B.
    pub point_b: Vec2,
    pub distance: f64,
    /// GJK iterations used.
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct SimplexVertex {
    /// Support point in proxy A.
    w_a: Vec2,
    /// Support point in proxy B.
    w_b: Vec2,
    /// `w_b - w_a`
    w: Vec2,
    /// Barycentric coordinate of the closest point.
    a: f64,
    index_a: usize,
    index_b: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Simplex {
    v: [SimplexVertex; 3],
    count: usize,
}

impl Simplex {
    fn read_cache(
        cache: &SimplexCache,
        proxy_a: &DistanceProxy,
        xf_a: &Transform,
        proxy_b: &DistanceProxy,
        xf_b: &Transform,
    ) -> Simplex {
        debug_assert!(cache.count <= 3);
        let mut simplex = Simplex {
            count: cache.count,
            ..Default::default()
        };
        for i in 0..simplex.count {
            let v = &mut simplex.v[i];
            v.index_a = cache.index_a[i];
            v.index_b = cache.index_b[i];
            v.w_a = xf_a.apply(proxy_a.vertex(v.index_a));
            v.w_b = xf_b.apply(proxy_b.vertex(v.index_b));
            v.w = v.w_b - v.w_a;
            v.a = 0.0;
        }

        // Flush the simplex if the metric changed a lot since it was cached.
        if simplex.count > 1 {
            let metric1 = cache.metric;
            let metric2 = simplex.metric();
            if metric2 < 0.5 * metric1 || 2.0 * metric1 < metric2 || metric2 < f64::EPSILON {
                simplex.count = 0;
            }
        }

        if simplex.count == 0 {
            let v = &mut simplex.v[0];
            v.index_a = 0;
            v.index_b = 0;
            v.w_a = xf_a.apply(proxy_a.vertex(0));
            v.w_b = xf_b.apply(proxy_b.vertex(0));
            v.w = v.w_b - v.w_a;
            v.a = 1.0;
            simplex.count = 1;
        }
        simplex
    }

    fn write_cache(&self, cache: &mut SimplexCache) {
        cache.metric = self.metric();
        cache.count = self.count;
        for i in 0..self.count {
            cache.index_a[i] = self.v[i].index_a;
            cache.index_b[i] = self.v[i].index_b;
        }
    }

    fn search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.v[0].w,
            2 => {
                let e12 = self.v[1].w - self.v[0].w;
                let sgn = e12.cross(-self.v[0].w);
                if sgn > 0.0 {
                    // Origin is left of e12.
                    Vec2::scalar_cross(1.0, e12)
                } else {
                    // Origin is right of e12.
                    e12.cross_scalar(1.0)
                }
            }
            _ => Vec2::ZERO,
        }
    }

    fn witness_points(&self) -> (Vec2, Vec2) {
        let v = &self.v;
        match self.count {
            1 => (v[0].w_a, v[0].w_b),
            2 => (
                v[0].w_a * v[0].a + v[1].w_a * v[1].a,
                v[0].w_b * v[0].a + v[1].w_b * v[1].a,
            ),
            3 => {
                let p = v[0].w_a * v[0].a + v[1].w_a * v[1].a + v[2].w_a * v[2].a;
                (p, p)
            }
            _ => (Vec2::ZERO, Vec2::ZERO),
        }
    }

    fn metric(&self) -> f64 {
        let v = &self.v;
        match self.count {
            2 => v[0].w.distance(v[1].w),
            3 => (v[1].w - v[0].w).cross(v[2].w - v[0].w),
            _ => 0.0,
        }
    }

    // Solve a line segment using barycentric coordinates.
    //
    // p = a1 * w1 + a2 * w2, a1 + a2 = 1
    // The vector from the origin to the closest point on the line is
    // perpendicular to the line: dot(p, e12) = 0 with e12 = w2 - w1.
    fn solve2(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let e12 = w2 - w1;

        // w1 region
        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            // a2 <= 0, so we clamp it to 0
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // w2 region
        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            // a1 <= 0, so we clamp it to 0
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        // Must be in e12 region.
        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.v[0].a = d12_1 * inv_d12;
        self.v[1].a = d12_2 * inv_d12;
        self.count = 2;
    }

    // Possible regions:
    // - points[2]
    // - edge points[0]-points[2]
    // - edge points[1]-points[2]
    // - inside the triangle
    fn solve3(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let w3 = self.v[2].w;

        // Edge12
        let e12 = w2 - w1;
        let d12_1 = w2.dot(e12);
        let d12_2 = -w1.dot(e12);

        // Edge13
        let e13 = w3 - w1;
        let d13_1 = w3.dot(e13);
        let d13_2 = -w1.dot(e13);

        // Edge23
        let e23 = w3 - w2;
        let d23_1 = w3.dot(e23);
        let d23_2 = -w2.dot(e23);

        // Triangle123
        let n123 = e12.cross(e13);
        let d123_1 = n123 * w2.cross(w3);
        let d123_2 = n123 * w3.cross(w1);
        let d123_3 = n123 * w1.cross(w2);

        // w1 region
        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // e12
        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv_d12 = 1.0 / (d12_1 + d12_2);
            self.v[0].a = d12_1 * inv_d12;
            self.v[1].a = d12_2 * inv_d12;
            self.count = 2;
            return;
        }

        // e13
        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv_d13 = 1.0 / (d13_1 + d13_2);
            self.v[0].a = d13_1 * inv_d13;
            self.v[2].a = d13_2 * inv_d13;
            self.count = 2;
            self.v[1] = self.v[2];
            return;
        }

        // w2 region
        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        // w3 region
        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            self.v[2].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[2];
            return;
        }

        // e23
        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            let inv_d23 = 1.0 / (d23_1 + d23_2);
            self.v[1].a = d23_1 * inv_d23;
            self.v[2].a = d23_2 * inv_d23;
            self.count = 2;
            self.v[0] = self.v[2];
            return;
        }

        // Must be in triangle123
        let inv_d123 = 1.0 / (d123_1 + d123_2 + d123_3);
        self.v[0].a = d123_1 * inv_d123;
        self.v[1].a = d123_2 * inv_d123;
        self.v[2].a = d123_3 * inv_d123;
        self.count = 3;
    }
}

/// Closest points between two convex proxies.
///
/// `cache` warm starts the search and receives the final simplex. With
/// `use_radii` the skin radii are subtracted from the core distance.
pub fn distance(cache: &mut SimplexCache, input: &DistanceInput) -> DistanceOutput {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;
    let xf_a = input.transform_a;
    let xf_b = input.transform_b;

    let mut simplex = Simplex::read_cache(cache, proxy_a, &xf_a, proxy_b, &xf_b);

    // Vertices of the last simplex, used to detect cycling.
    let mut save_a = [0usize; 3];
    let mut save_b = [0usize; 3];

    let mut iter = 0;
    while iter < MAX_GJK_ITERATIONS {
        let save_count = simplex.count;
        for i in 0..save_count {
            save_a[i] = simplex.v[i].index_a;
            save_b[i] = simplex.v[i].index_b;
        }

        match simplex.count {
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => {}
        }

        // The origin is inside the triangle: overlap.
        if simplex.count == 3 {
            break;
        }

        let d = simplex.search_direction();

        // The origin is probably on the simplex; stop before dividing by tiny numbers.
        if d.magnitude_squared() < f64::EPSILON * f64::EPSILON {
            break;
        }

        let index_a = proxy_a.support(xf_a.rotation.mul_t_vec(-d));
        let index_b = proxy_b.support(xf_b.rotation.mul_t_vec(d));
        let w_a = xf_a.apply(proxy_a.vertex(index_a));
        let w_b = xf_b.apply(proxy_b.vertex(index_b));

        iter += 1;

        // A repeated support point means no further progress is possible.
        let duplicate =
            (0..save_count).any(|i| index_a == save_a[i] && index_b == save_b[i]);
        if duplicate {
            break;
        }

        simplex.v[simplex.count] = SimplexVertex {
            w_a,
            w_b,
            w: w_b - w_a,
            a: 0.0,
            index_a,
            index_b,
        };
        simplex.count += 1;
    }

    let (mut point_a, mut point_b) = simplex.witness_points();
    let mut dist = point_a.distance(point_b);
    simplex.write_cache(cache);

    if input.use_radii {
        if dist < f64::EPSILON {
            // Shapes are too close to safely compute a normal.
            let p = (point_a + point_b) * 0.5;
            point_a = p;
            point_b = p;
            dist = 0.0;
        } else {
            let r_a = proxy_a.radius;
            let r_b = proxy_b.radius;
            dist = (dist - r_a - r_b).max(0.0);
            let normal = (point_b - point_a).normalize();
            point_a += normal * r_a;
            point_b -= normal * r_b;
        }
    }

    DistanceOutput {
        point_a,
        point_b,
        distance: dist,
        iterations: iter,
    }
}

/// True when two shape children overlap, skin radii included.
pub fn test_overlap(
    shape_a: &Shape,
    index_a: usize,
    shape_b: &Shape,
    index_b: usize,
    xf_a: &Transform,
    xf_b: &Transform,
) -> bool {
    let input = DistanceInput {
        proxy_a: DistanceProxy::new(shape_a, index_a),
        proxy_b: DistanceProxy::new(shape_b, index_b),
        transform_a: *xf_a,
        transform_b: *xf_b,
        use_radii: true,
    };
    let mut cache = SimplexCache::default();
    let output = distance(&mut cache, &input);
    output.distance < 10.0 * f64::EPSILON
}
