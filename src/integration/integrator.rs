use crate::dynamics::{Position, Velocity};
use crate::math::Vec2;
use crate::objects::Body;
use crate::settings::{MAX_ROTATION, MAX_TRANSLATION};

/// Velocity half of the semi-implicit Euler step.
///
/// Applies gravity (scaled per body), the accumulated force and torque,
/// then damping. Only dynamic bodies accelerate; kinematic bodies keep
/// their velocity.
pub fn integrate_velocity(body: &Body, gravity: Vec2, h: f64) -> Velocity {
    let mut v = body.linear_velocity;
    let mut w = body.angular_velocity;

    if !body.is_dynamic() {
        return Velocity { v, w };
    }

    v += (gravity * (body.gravity_scale * body.mass) + body.force) * (h * body.inv_mass);
    w += h * body.inv_inertia * body.torque;

    // Pade approximation of exp(-c * h), stable for large damping.
    v *= 1.0 / (1.0 + h * body.linear_damping);
    w *= 1.0 / (1.0 + h * body.angular_damping);

    Velocity { v, w }
}

/// Position half of the semi-implicit Euler step.
///
/// Velocities producing more than `MAX_TRANSLATION` / `MAX_ROTATION` of
/// motion in one step are scaled down first.
pub fn integrate_position(position: &mut Position, velocity: &mut Velocity, h: f64) {
    let translation = velocity.v * h;
    if translation.magnitude_squared() > MAX_TRANSLATION * MAX_TRANSLATION {
        velocity.v *= MAX_TRANSLATION / translation.magnitude();
    }

    let rotation = h * velocity.w;
    if rotation * rotation > MAX_ROTATION * MAX_ROTATION {
        velocity.w *= MAX_ROTATION / rotation.abs();
    }

    position.c += velocity.v * h;
    position.a += h * velocity.w;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{BodyDef, BodyType};
    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_integrate_linear_motion_no_force() {
        let body = Body::new(&BodyDef::dynamic().with_linear_velocity(Vec2::new(10.0, -5.0)));
        let h = 0.1;

        let mut velocity = integrate_velocity(&body, Vec2::ZERO, h);
        assert_eq!(velocity.v, Vec2::new(10.0, -5.0));

        let mut position = Position::default();
        integrate_position(&mut position, &mut velocity, h);
        assert!((position.c.x - 1.0).abs() < EPSILON);
        assert!((position.c.y - -0.5).abs() < EPSILON);
    }

    #[test]
    fn test_integrate_linear_motion_constant_force() {
        let mut body = Body::new(&BodyDef::dynamic());
        body.apply_force_to_center(Vec2::new(10.0, 0.0), true);
        // Unit mass from the empty fixture list.
        let h = 0.1;

        let mut velocity = integrate_velocity(&body, Vec2::ZERO, h);
        assert!((velocity.v.x - 1.0).abs() < EPSILON);

        let mut position = Position::default();
        integrate_position(&mut position, &mut velocity, h);
        assert!((position.c.x - 0.1).abs() < EPSILON);
    }

    #[test]
    fn test_gravity_scale_and_damping() {
        let body = Body::new(
            &BodyDef::dynamic()
                .with_gravity_scale(0.5)
                .with_damping(1.0, 0.0),
        );
        let h = 0.5;
        let velocity = integrate_velocity(&body, Vec2::new(0.0, -10.0), h);
        // v = (-10 * 0.5 * 0.5) / (1 + 0.5)
        assert!((velocity.v.y - (-2.5 / 1.5)).abs() < EPSILON);
    }

    #[test]
    fn test_kinematic_body_ignores_gravity() {
        let body = Body::new(
            &BodyDef::new(BodyType::Kinematic).with_linear_velocity(Vec2::new(1.0, 0.0)),
        );
        let velocity = integrate_velocity(&body, Vec2::new(0.0, -10.0), 0.1);
        assert_eq!(velocity.v, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_translation_is_clamped() {
        let mut position = Position::default();
        let mut velocity = Velocity {
            v: Vec2::new(1000.0, 0.0),
            w: 1000.0,
        };
        let h = 1.0 / 60.0;
        integrate_position(&mut position, &mut velocity, h);
        assert!((position.c.x - MAX_TRANSLATION).abs() < EPSILON);
        assert!((position.a - MAX_ROTATION).abs() < EPSILON);
        assert!((velocity.v.x - MAX_TRANSLATION / h).abs() < 1e-6);
    }
}
