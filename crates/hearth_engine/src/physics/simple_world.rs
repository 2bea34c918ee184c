//! In-crate rigid-body world
//!
//! Semi-implicit Euler integration with substeps, positional contact
//! correction and velocity-level restitution/friction. Dynamic bodies collide
//! with every other body; kinematic and static bodies are immovable. Bodies
//! resting on something long enough fall asleep until woken by an impulse, a
//! velocity change or a teleport.

use super::backend::{BodyDesc, BodyHandle, BodyKind, ContactPoint, PhysicsBackend};
use super::collision::contact;
use super::PhysicsError;
use crate::foundation::math::{Quat, Transform, Vec3};
use slotmap::SlotMap;
use std::fmt;

/// Speed below which a resting body accumulates sleep time
const SLEEP_SPEED: f32 = 0.05;

/// Resting time before a body falls asleep, in seconds
const SLEEP_DELAY: f32 = 0.5;

#[derive(Debug, Clone)]
struct Body {
    desc: BodyDesc,
    transform: Transform,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    sleeping: bool,
    rest_time: f32,
    moved: bool,
}

impl Body {
    fn is_simulated(&self) -> bool {
        self.desc.kind == BodyKind::Dynamic && !self.sleeping
    }

    fn inverse_mass(&self) -> f32 {
        match self.desc.kind {
            BodyKind::Dynamic => 1.0 / self.desc.mass,
            BodyKind::Kinematic | BodyKind::Static => 0.0,
        }
    }

    fn wake(&mut self) {
        self.sleeping = false;
        self.rest_time = 0.0;
    }
}

/// Simple rigid-body world
pub struct SimplePhysicsWorld {
    bodies: SlotMap<BodyHandle, Body>,
    gravity: Vec3,
    steps: u64,
}

impl Default for SimplePhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SimplePhysicsWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimplePhysicsWorld")
            .field("body_count", &self.bodies.len())
            .field("gravity", &self.gravity)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl SimplePhysicsWorld {
    /// Create a world with earth gravity
    pub fn new() -> Self {
        Self::with_gravity(Vec3::new(0.0, -9.81, 0.0))
    }

    /// Create a world with custom gravity
    pub fn with_gravity(gravity: Vec3) -> Self {
        Self {
            bodies: SlotMap::with_key(),
            gravity,
            steps: 0,
        }
    }

    /// Number of substeps simulated so far
    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn body(&self, handle: BodyHandle) -> Result<&Body, PhysicsError> {
        self.bodies.get(handle).ok_or(PhysicsError::UnknownBody(handle))
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Result<&mut Body, PhysicsError> {
        self.bodies.get_mut(handle).ok_or(PhysicsError::UnknownBody(handle))
    }

    fn integrate(&mut self, h: f32) {
        let gravity = self.gravity;
        for body in self.bodies.values_mut() {
            body.moved = false;
            if !body.is_simulated() {
                continue;
            }

            body.linear_velocity += gravity * h;
            body.linear_velocity /= 1.0 + body.desc.linear_damping * h;
            body.transform.translation += body.linear_velocity * h;

            if !body.desc.lock_rotation && body.angular_velocity.norm_squared() > 0.0 {
                let delta = Quat::from_scaled_axis(body.angular_velocity * h);
                body.transform.rotation = delta * body.transform.rotation;
            }
            body.moved = true;
        }
    }

    fn resolve_contacts(&mut self) -> Vec<BodyHandle> {
        let handles: Vec<BodyHandle> = self.bodies.keys().collect();
        let mut touching = Vec::new();

        for (i, &a) in handles.iter().enumerate() {
            for &b in &handles[i + 1..] {
                let (Some(body_a), Some(body_b)) = (self.bodies.get(a), self.bodies.get(b)) else {
                    continue;
                };
                if !body_a.is_simulated() && !body_b.is_simulated() {
                    continue;
                }

                let Some(hit) = contact(&body_a.desc.shape, &body_a.transform, &body_b.desc.shape, &body_b.transform)
                else {
                    continue;
                };
                touching.push(a);
                touching.push(b);
                if hit.depth <= 0.0 {
                    continue;
                }

                let inv_a = body_a.inverse_mass();
                let inv_b = body_b.inverse_mass();
                let inv_sum = inv_a + inv_b;
                if inv_sum <= 0.0 {
                    continue;
                }

                let restitution = body_a.desc.restitution.max(body_b.desc.restitution);
                let friction = (body_a.desc.friction * body_b.desc.friction).sqrt();
                let relative = body_a.linear_velocity - body_b.linear_velocity;
                let normal_speed = relative.dot(&hit.normal);

                let correction = hit.normal * (hit.depth / inv_sum);
                let (impulse, tangent_loss) = if normal_speed < 0.0 {
                    let impulse = hit.normal * (-(1.0 + restitution) * normal_speed / inv_sum);
                    let tangent = relative - hit.normal * normal_speed;
                    (impulse, tangent * (friction / inv_sum))
                } else {
                    (Vec3::zeros(), Vec3::zeros())
                };

                // Waking is contagious only from moving bodies
                let a_moving = body_a.is_simulated();
                let b_moving = body_b.is_simulated();

                if let Some(body) = self.bodies.get_mut(a) {
                    body.transform.translation += correction * inv_a;
                    body.linear_velocity += (impulse - tangent_loss) * inv_a;
                    if inv_a > 0.0 && b_moving {
                        body.wake();
                    }
                }
                if let Some(body) = self.bodies.get_mut(b) {
                    body.transform.translation -= correction * inv_b;
                    body.linear_velocity -= (impulse - tangent_loss) * inv_b;
                    if inv_b > 0.0 && a_moving {
                        body.wake();
                    }
                }
            }
        }

        touching
    }

    fn update_sleep(&mut self, h: f32, touching: &[BodyHandle]) {
        for (handle, body) in &mut self.bodies {
            if !body.is_simulated() || !body.desc.can_sleep {
                continue;
            }
            let resting = touching.contains(&handle) && body.linear_velocity.norm() < SLEEP_SPEED;
            if resting {
                body.rest_time += h;
                if body.rest_time >= SLEEP_DELAY {
                    body.sleeping = true;
                    body.linear_velocity = Vec3::zeros();
                    body.angular_velocity = Vec3::zeros();
                    log::trace!("body {handle:?} fell asleep");
                }
            } else {
                body.rest_time = 0.0;
            }
        }
    }
}

impl PhysicsBackend for SimplePhysicsWorld {
    fn step(&mut self, dt: f32, substeps: u32) {
        if dt <= 0.0 {
            return;
        }
        let substeps = substeps.max(1);
        let h = dt / substeps as f32;
        let mut moved_this_step = Vec::new();

        for _ in 0..substeps {
            self.integrate(h);
            moved_this_step.extend(self.bodies.iter().filter(|(_, b)| b.moved).map(|(k, _)| k));
            let touching = self.resolve_contacts();
            self.update_sleep(h, &touching);
            self.steps += 1;
        }

        for handle in moved_this_step {
            if let Some(body) = self.bodies.get_mut(handle) {
                body.moved = true;
            }
        }
    }

    fn add_body(&mut self, desc: &BodyDesc, transform: Transform) -> BodyHandle {
        self.bodies.insert(Body {
            desc: *desc,
            transform,
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            sleeping: false,
            rest_time: 0.0,
            moved: false,
        })
    }

    fn remove_body(&mut self, handle: BodyHandle) -> Result<(), PhysicsError> {
        self.bodies
            .remove(handle)
            .map(|_| ())
            .ok_or(PhysicsError::UnknownBody(handle))
    }

    fn set_body_transform(&mut self, handle: BodyHandle, transform: Transform) -> Result<(), PhysicsError> {
        let body = self.body_mut(handle)?;
        body.transform = transform;
        body.wake();
        Ok(())
    }

    fn body_transform(&self, handle: BodyHandle) -> Result<Transform, PhysicsError> {
        Ok(self.body(handle)?.transform)
    }

    fn is_body_active(&self, handle: BodyHandle) -> bool {
        self.bodies.get(handle).is_some_and(|body| body.desc.kind == BodyKind::Dynamic && body.moved)
    }

    fn linear_velocity(&self, handle: BodyHandle) -> Result<Vec3, PhysicsError> {
        Ok(self.body(handle)?.linear_velocity)
    }

    fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec3) -> Result<(), PhysicsError> {
        let body = self.body_mut(handle)?;
        if body.desc.kind == BodyKind::Dynamic {
            body.linear_velocity = velocity;
            body.wake();
        }
        Ok(())
    }

    fn apply_impulse(&mut self, handle: BodyHandle, impulse: Vec3) -> Result<(), PhysicsError> {
        let body = self.body_mut(handle)?;
        if body.desc.kind == BodyKind::Dynamic {
            body.linear_velocity += impulse * body.inverse_mass();
            body.wake();
        }
        Ok(())
    }

    fn contact_test(&self, handle: BodyHandle) -> Result<Vec<ContactPoint>, PhysicsError> {
        let body = self.body(handle)?;
        Ok(self
            .bodies
            .iter()
            .filter(|(other, _)| *other != handle)
            .filter_map(|(other, other_body)| {
                contact(&body.desc.shape, &body.transform, &other_body.desc.shape, &other_body.transform).map(|hit| {
                    ContactPoint {
                        other,
                        normal: hit.normal,
                        depth: hit.depth,
                        point: hit.point,
                    }
                })
            })
            .collect())
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn gravity(&self) -> Vec3 {
        self.gravity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collision::Shape;
    use approx::assert_relative_eq;

    fn floor() -> BodyDesc {
        BodyDesc::fixed(Shape::Box { half_extents: Vec3::new(20.0, 0.5, 20.0) })
    }

    #[test]
    fn test_free_fall_matches_kinematics() {
        let mut world = SimplePhysicsWorld::new();
        let ball = world.add_body(
            &BodyDesc::dynamic(Shape::Sphere { radius: 0.5 }, 1.0).with_friction(0.0),
            Transform::from_translation(Vec3::new(0.0, 100.0, 0.0)),
        );
        // No damping so the result is comparable to the closed form
        world.body_mut(ball).unwrap().desc.linear_damping = 0.0;

        for _ in 0..60 {
            world.step(1.0 / 60.0, 10);
        }

        let fallen = 100.0 - world.body_transform(ball).unwrap().translation.y;
        assert_relative_eq!(fallen, 0.5 * 9.81, epsilon = 0.05);
        assert!(world.is_body_active(ball));
    }

    #[test]
    fn test_ball_comes_to_rest_on_floor_and_sleeps() {
        let mut world = SimplePhysicsWorld::new();
        world.add_body(&floor(), Transform::identity());
        let ball = world.add_body(
            &BodyDesc::dynamic(Shape::Sphere { radius: 0.5 }, 1.0),
            Transform::from_translation(Vec3::new(0.0, 3.0, 0.0)),
        );

        for _ in 0..240 {
            world.step(1.0 / 60.0, 10);
        }

        let y = world.body_transform(ball).unwrap().translation.y;
        assert_relative_eq!(y, 1.0, epsilon = 0.05);
        assert!(!world.is_body_active(ball));

        world.apply_impulse(ball, Vec3::new(0.0, 5.0, 0.0)).unwrap();
        world.step(1.0 / 60.0, 10);
        assert!(world.is_body_active(ball));
    }

    #[test]
    fn test_kinematic_body_is_not_simulated() {
        let mut world = SimplePhysicsWorld::new();
        let platform = world.add_body(
            &BodyDesc::kinematic(Shape::Box { half_extents: Vec3::new(1.0, 0.1, 1.0) }),
            Transform::identity(),
        );

        world.set_body_transform(platform, Transform::from_translation(Vec3::new(5.0, 0.0, 0.0))).unwrap();
        world.step(0.016, 10);

        assert_relative_eq!(world.body_transform(platform).unwrap().translation, Vec3::new(5.0, 0.0, 0.0));
        assert!(!world.is_body_active(platform));
    }

    #[test]
    fn test_contact_test_reports_ground() {
        let mut world = SimplePhysicsWorld::new();
        let ground = world.add_body(&floor(), Transform::identity());
        let capsule = world.add_body(
            &BodyDesc::dynamic(Shape::Capsule { radius: 0.3, half_height: 0.6 }, 70.0).with_locked_rotation(),
            Transform::from_translation(Vec3::new(0.0, 1.4, 0.0)),
        );

        let contacts = world.contact_test(capsule).unwrap();

        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].other, ground);
        assert!(contacts[0].normal.y > 0.9);
    }

    #[test]
    fn test_unknown_body_is_an_error() {
        let mut world = SimplePhysicsWorld::new();
        let handle = world.add_body(&floor(), Transform::identity());
        world.remove_body(handle).unwrap();

        assert!(matches!(world.body_transform(handle), Err(PhysicsError::UnknownBody(_))));
        assert!(world.remove_body(handle).is_err());
        assert_eq!(world.body_count(), 0);
    }
}
