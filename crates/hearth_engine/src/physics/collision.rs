//! Collision shapes and narrow-phase contact generation
//!
//! Every shape is reduced to a *core* inflated by a radius: a sphere is a point
//! plus radius, a capsule a segment plus radius, and a box an oriented box with
//! no radius. Contacts are computed between cores and then corrected by the
//! radii.

use crate::foundation::math::{Transform, Vec3};
use serde::{Deserialize, Serialize};

/// Distance below which two shapes count as touching
pub const CONTACT_SLOP: f32 = 0.01;

/// A ray for ray casting
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// The origin point of the ray in world space
    pub origin: Vec3,
    /// The direction of the ray (normalized)
    pub direction: Vec3,
}

impl Ray {
    /// Creates a new ray with the given origin and direction
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Get a point along the ray at distance t
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// A bounding sphere for coarse overlap tests
#[derive(Debug, Clone, Copy)]
pub struct BoundingSphere {
    /// The center position of the sphere in world space
    pub center: Vec3,
    /// The radius of the sphere
    pub radius: f32,
}

impl BoundingSphere {
    /// Creates a new bounding sphere with the given center and radius
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Check if this sphere intersects with another, allowing `margin` of separation
    pub fn intersects(&self, other: &BoundingSphere, margin: f32) -> bool {
        let radius_sum = self.radius + other.radius + margin;
        (self.center - other.center).magnitude_squared() <= radius_sum * radius_sum
    }

    /// Test ray intersection with this sphere
    ///
    /// Returns the distance along the ray of the closest hit in front of the origin.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let oc = ray.origin - self.center;
        let b = oc.dot(&ray.direction);
        let c = oc.dot(&oc) - self.radius * self.radius;
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }

        let sqrt_discriminant = discriminant.sqrt();
        [-b - sqrt_discriminant, -b + sqrt_discriminant]
            .into_iter()
            .find(|t| *t >= 0.0)
    }
}

/// Collision shape of a rigid body, in body space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Sphere centered on the body origin
    Sphere {
        /// Sphere radius
        radius: f32,
    },
    /// Box centered on the body origin
    Box {
        /// Half size along each local axis
        half_extents: Vec3,
    },
    /// Capsule along the local Y axis
    Capsule {
        /// Radius of the capsule
        radius: f32,
        /// Half length of the inner segment
        half_height: f32,
    },
}

impl Shape {
    /// Radius of a sphere enclosing the shape
    pub fn bounding_radius(&self) -> f32 {
        match *self {
            Shape::Sphere { radius } => radius,
            Shape::Box { half_extents } => half_extents.norm(),
            Shape::Capsule { radius, half_height } => radius + half_height,
        }
    }

    /// Bounding sphere of the shape placed at `transform`
    pub fn bounding_sphere(&self, transform: &Transform) -> BoundingSphere {
        BoundingSphere::new(transform.translation, self.bounding_radius())
    }

    /// Whether the shape parameters are usable
    pub fn is_valid(&self) -> bool {
        match *self {
            Shape::Sphere { radius } => radius > 0.0,
            Shape::Box { half_extents } => half_extents.iter().all(|e| *e > 0.0),
            Shape::Capsule { radius, half_height } => radius > 0.0 && half_height >= 0.0,
        }
    }
}

/// Contact between two placed shapes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Unit normal pointing from the second shape towards the first
    pub normal: Vec3,
    /// Penetration depth; negative while separated by less than the slop
    pub depth: f32,
    /// Contact point on the surface of the second shape
    pub point: Vec3,
}

enum Core {
    Segment { a: Vec3, b: Vec3, radius: f32 },
    Box { transform: Transform, half_extents: Vec3 },
}

fn core_of(shape: &Shape, transform: &Transform) -> Core {
    match *shape {
        Shape::Sphere { radius } => Core::Segment {
            a: transform.translation,
            b: transform.translation,
            radius,
        },
        Shape::Capsule { radius, half_height } => {
            let axis = transform.transform_vector(&Vec3::new(0.0, half_height, 0.0));
            Core::Segment {
                a: transform.translation - axis,
                b: transform.translation + axis,
                radius,
            }
        }
        Shape::Box { half_extents } => Core::Box {
            transform: *transform,
            half_extents,
        },
    }
}

fn closest_on_segment(a: &Vec3, b: &Vec3, point: &Vec3) -> Vec3 {
    let ab = b - a;
    let length_squared = ab.norm_squared();
    if length_squared <= f32::EPSILON {
        return *a;
    }
    let t = ((point - a).dot(&ab) / length_squared).clamp(0.0, 1.0);
    a + ab * t
}

/// Closest points between segments `p1q1` and `p2q2`
fn closest_between_segments(p1: &Vec3, q1: &Vec3, p2: &Vec3, q2: &Vec3) -> (Vec3, Vec3) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.norm_squared();
    let e = d2.norm_squared();
    let f = d2.dot(&r);

    if a <= f32::EPSILON && e <= f32::EPSILON {
        return (*p1, *p2);
    }
    if a <= f32::EPSILON {
        return (*p1, closest_on_segment(p2, q2, p1));
    }
    if e <= f32::EPSILON {
        return (closest_on_segment(p1, q1, p2), *p2);
    }

    let c = d1.dot(&r);
    let b = d1.dot(&d2);
    let denom = a * e - b * b;
    let mut s = if denom > f32::EPSILON {
        ((b * f - c * e) / denom).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let mut t = (b * s + f) / e;
    if t < 0.0 {
        t = 0.0;
        s = (-c / a).clamp(0.0, 1.0);
    } else if t > 1.0 {
        t = 1.0;
        s = ((b - c) / a).clamp(0.0, 1.0);
    }
    (p1 + d1 * s, p2 + d2 * t)
}

/// Signed-distance contact of a point against an oriented box
///
/// Returns the closest surface point, the outward normal at it and the
/// signed distance (negative inside).
fn point_box(point: &Vec3, transform: &Transform, half_extents: &Vec3) -> (Vec3, Vec3, f32) {
    let local = transform.inverse().transform_point(point);
    let clamped = Vec3::new(
        local.x.clamp(-half_extents.x, half_extents.x),
        local.y.clamp(-half_extents.y, half_extents.y),
        local.z.clamp(-half_extents.z, half_extents.z),
    );

    let outside = local - clamped;
    let distance = outside.norm();
    if distance > f32::EPSILON {
        let normal = transform.transform_vector(&(outside / distance));
        return (transform.transform_point(&clamped), normal, distance);
    }

    // Inside: push out through the nearest face
    let mut best_axis = 0;
    let mut best_gap = f32::MAX;
    for axis in 0..3 {
        let gap = half_extents[axis] - local[axis].abs();
        if gap < best_gap {
            best_gap = gap;
            best_axis = axis;
        }
    }
    let mut local_normal = Vec3::zeros();
    local_normal[best_axis] = if local[best_axis] >= 0.0 { 1.0 } else { -1.0 };
    let mut surface = local;
    surface[best_axis] = half_extents[best_axis] * local_normal[best_axis];

    (
        transform.transform_point(&surface),
        transform.transform_vector(&local_normal),
        -best_gap,
    )
}

fn segment_box(a: &Vec3, b: &Vec3, radius: f32, transform: &Transform, half_extents: &Vec3) -> Contact {
    // Alternate closest-point projections; converges quickly for convex pairs
    let mut on_segment = closest_on_segment(a, b, &transform.translation);
    let mut result = point_box(&on_segment, transform, half_extents);
    for _ in 0..3 {
        on_segment = closest_on_segment(a, b, &result.0);
        result = point_box(&on_segment, transform, half_extents);
    }
    let (surface, normal, distance) = result;
    Contact {
        normal,
        depth: radius - distance,
        point: surface,
    }
}

/// Separating-axis test between two oriented boxes
fn box_box(
    a_transform: &Transform,
    a_half: &Vec3,
    b_transform: &Transform,
    b_half: &Vec3,
) -> Option<Contact> {
    let a_axes = [
        a_transform.transform_vector(&Vec3::x()),
        a_transform.transform_vector(&Vec3::y()),
        a_transform.transform_vector(&Vec3::z()),
    ];
    let b_axes = [
        b_transform.transform_vector(&Vec3::x()),
        b_transform.transform_vector(&Vec3::y()),
        b_transform.transform_vector(&Vec3::z()),
    ];
    let delta = a_transform.translation - b_transform.translation;
    let project = |axes: &[Vec3; 3], half: &Vec3, axis: &Vec3| {
        (0..3).map(|i| half[i] * axes[i].dot(axis).abs()).sum::<f32>()
    };

    let mut candidates: Vec<Vec3> = a_axes.iter().chain(b_axes.iter()).copied().collect();
    for a_axis in &a_axes {
        for b_axis in &b_axes {
            candidates.push(a_axis.cross(b_axis));
        }
    }

    // (overlap, normal, extent of `a` along the normal)
    let mut best: Option<(f32, Vec3, f32)> = None;
    for axis in candidates {
        let length = axis.norm();
        if length < 1e-6 {
            continue;
        }
        let axis = axis / length;
        let a_extent = project(&a_axes, a_half, &axis);
        let b_extent = project(&b_axes, b_half, &axis);
        let distance = delta.dot(&axis);
        let overlap = a_extent + b_extent - distance.abs();
        if overlap < -CONTACT_SLOP {
            return None;
        }
        // Face axes come first and win ties against edge axes
        if best.map_or(true, |(depth, _, _)| overlap < depth - 1e-6) {
            let normal = if distance >= 0.0 { axis } else { -axis };
            best = Some((overlap, normal, a_extent));
        }
    }

    let (depth, normal, a_extent) = best?;
    Some(Contact {
        normal,
        depth,
        point: a_transform.translation - normal * (a_extent - depth),
    })
}

/// Contact between shape `a` at `a_transform` and shape `b` at `b_transform`
///
/// Returns `None` when the shapes are farther apart than [`CONTACT_SLOP`].
/// The normal points from `b` towards `a`.
pub fn contact(a: &Shape, a_transform: &Transform, b: &Shape, b_transform: &Transform) -> Option<Contact> {
    if !a
        .bounding_sphere(a_transform)
        .intersects(&b.bounding_sphere(b_transform), CONTACT_SLOP)
    {
        return None;
    }

    let contact = match (core_of(a, a_transform), core_of(b, b_transform)) {
        (Core::Segment { a: p1, b: q1, radius: ra }, Core::Segment { a: p2, b: q2, radius: rb }) => {
            let (on_a, on_b) = closest_between_segments(&p1, &q1, &p2, &q2);
            let delta = on_a - on_b;
            let distance = delta.norm();
            let normal = if distance > f32::EPSILON { delta / distance } else { Vec3::y() };
            Contact {
                normal,
                depth: ra + rb - distance,
                point: on_b + normal * rb,
            }
        }
        (Core::Segment { a: p, b: q, radius }, Core::Box { transform, half_extents }) => {
            segment_box(&p, &q, radius, &transform, &half_extents)
        }
        (Core::Box { transform, half_extents }, Core::Segment { a: p, b: q, radius }) => {
            let flipped = segment_box(&p, &q, radius, &transform, &half_extents);
            Contact {
                normal: -flipped.normal,
                depth: flipped.depth,
                point: flipped.point - flipped.normal * flipped.depth.max(0.0),
            }
        }
        (
            Core::Box { transform: ta, half_extents: ha },
            Core::Box { transform: tb, half_extents: hb },
        ) => box_box(&ta, &ha, &tb, &hb)?,
    };

    (contact.depth > -CONTACT_SLOP).then_some(contact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn at(x: f32, y: f32, z: f32) -> Transform {
        Transform::from_translation(Vec3::new(x, y, z))
    }

    #[test]
    fn test_sphere_sphere_depth() {
        let sphere = Shape::Sphere { radius: 1.0 };
        let contact = contact(&sphere, &at(0.0, 1.5, 0.0), &sphere, &at(0.0, 0.0, 0.0)).unwrap();

        assert_relative_eq!(contact.depth, 0.5, epsilon = 1e-5);
        assert_relative_eq!(contact.normal, Vec3::y(), epsilon = 1e-5);
    }

    #[test]
    fn test_separated_shapes_do_not_touch() {
        let sphere = Shape::Sphere { radius: 0.5 };
        assert!(contact(&sphere, &at(0.0, 3.0, 0.0), &sphere, &at(0.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn test_sphere_resting_on_box() {
        let sphere = Shape::Sphere { radius: 0.5 };
        let floor = Shape::Box { half_extents: Vec3::new(10.0, 0.5, 10.0) };

        let contact = contact(&sphere, &at(1.0, 0.9, 2.0), &floor, &at(0.0, 0.0, 0.0)).unwrap();

        assert_relative_eq!(contact.normal, Vec3::y(), epsilon = 1e-5);
        assert_relative_eq!(contact.depth, 0.1, epsilon = 1e-5);
    }

    #[test]
    fn test_capsule_on_box_and_flipped_order() {
        let capsule = Shape::Capsule { radius: 0.3, half_height: 0.6 };
        let floor = Shape::Box { half_extents: Vec3::new(5.0, 0.5, 5.0) };

        let standing = contact(&capsule, &at(0.0, 1.35, 0.0), &floor, &at(0.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(standing.normal, Vec3::y(), epsilon = 1e-4);
        assert_relative_eq!(standing.depth, 0.05, epsilon = 1e-4);

        let flipped = contact(&floor, &at(0.0, 0.0, 0.0), &capsule, &at(0.0, 1.35, 0.0)).unwrap();
        assert_relative_eq!(flipped.normal, -Vec3::y(), epsilon = 1e-4);
    }

    #[test]
    fn test_box_stacked_on_box() {
        let cube = Shape::Box { half_extents: Vec3::new(0.5, 0.5, 0.5) };
        let contact = contact(&cube, &at(0.0, 0.95, 0.0), &cube, &at(0.0, 0.0, 0.0)).unwrap();

        assert_relative_eq!(contact.normal, Vec3::y(), epsilon = 1e-4);
        assert_relative_eq!(contact.depth, 0.05, epsilon = 1e-4);
    }

    #[test]
    fn test_ray_hits_sphere_front() {
        let sphere = BoundingSphere::new(Vec3::new(0.0, 0.0, -5.0), 1.0);
        let ray = Ray::new(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0));

        assert_relative_eq!(sphere.intersect_ray(&ray).unwrap(), 4.0, epsilon = 1e-5);
        assert_relative_eq!(ray.point_at(4.0), Vec3::new(0.0, 0.0, -4.0));
    }
}
