use std::collections::BTreeMap;

use slotmap::SlotMap;
use tracing::debug;

use crate::constraints::{Joint, JointBodies, JointHandle};
use crate::integration::{integrate_position, integrate_velocity};
use crate::math::Vec2;
use crate::objects::{Body, BodyHandle, BodyType};
use crate::settings::{ANGULAR_SLEEP_TOLERANCE, LINEAR_SLEEP_TOLERANCE, TIME_TO_SLEEP};

use super::contact::{Contact, ContactKey};
use super::contact_solver::{ContactImpulse, ContactSolver, ContactSolverDef, SolverBody};
use super::time_step::{Position, SolverData, TimeStep, Velocity};

/// A connected group of awake bodies with the contacts and joints
/// between them, solved together.
#[derive(Debug, Default)]
pub(crate) struct Island {
    pub bodies: Vec<BodyHandle>,
    pub contacts: Vec<ContactKey>,
    pub joints: Vec<JointHandle>,
}

/// World state an island needs while solving.
pub(crate) struct IslandContext<'a> {
    pub step: TimeStep,
    pub gravity: Vec2,
    pub allow_sleep: bool,
    pub bodies: &'a mut SlotMap<BodyHandle, Body>,
    pub contacts: &'a mut BTreeMap<ContactKey, Contact>,
    pub joints: &'a mut SlotMap<JointHandle, Joint>,
}

#[derive(Debug, Default)]
pub(crate) struct IslandReport {
    /// Solved impulses per contact, for post-solve listeners.
    pub impulses: Vec<(ContactKey, ContactImpulse)>,
    pub position_solved: bool,
    pub slept: bool,
}

fn solver_body(body: &Body) -> SolverBody {
    SolverBody {
        index: body.island_index,
        local_center: body.sweep.local_center,
        inv_mass: body.inv_mass,
        inv_i: body.inv_inertia,
    }
}

impl Island {
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.contacts.clear();
        self.joints.clear();
    }

    pub fn solve(&self, ctx: IslandContext<'_>) -> IslandReport {
        let IslandContext {
            step,
            gravity,
            allow_sleep,
            bodies,
            contacts,
            joints,
        } = ctx;
        let h = step.dt;

        let mut positions = Vec::with_capacity(self.bodies.len());
        let mut velocities = Vec::with_capacity(self.bodies.len());

        // Integrate velocities and remember the start of the sweep.
        for &handle in &self.bodies {
            let Some(body) = bodies.get_mut(handle) else {
                continue;
            };
            body.island_index = positions.len();
            body.sweep.c0 = body.sweep.c;
            body.sweep.a0 = body.sweep.a;

            positions.push(Position {
                c: body.sweep.c,
                a: body.sweep.a,
            });
            velocities.push(integrate_velocity(body, gravity, h));
        }

        let (keys, defs): (Vec<ContactKey>, Vec<ContactSolverDef>) = self
            .contacts
            .iter()
            .filter_map(|&key| {
                let contact = contacts.get(&key)?;
                let body_a = bodies.get(contact.body_a)?;
                let body_b = bodies.get(contact.body_b)?;
                let def = ContactSolverDef {
                    manifold: contact.manifold,
                    radius_a: contact.radius_a,
                    radius_b: contact.radius_b,
                    friction: contact.friction,
                    restitution: contact.restitution,
                    tangent_speed: contact.tangent_speed,
                    body_a: solver_body(body_a),
                    body_b: solver_body(body_b),
                };
                Some((key, def))
            })
            .unzip();

        let joint_bodies: Vec<JointBodies> = self
            .joints
            .iter()
            .map(|&handle| {
                joints
                    .get(handle)
                    .and_then(|joint| {
                        let a = bodies.get(joint.body_a)?;
                        let b = bodies.get(joint.body_b)?;
                        Some(JointBodies {
                            a: solver_body(a),
                            b: solver_body(b),
                        })
                    })
                    .unwrap_or_default()
            })
            .collect();

        let mut contact_solver = ContactSolver::new(step, &defs);
        contact_solver.initialize_velocity_constraints(&positions, &velocities);
        if step.warm_starting {
            contact_solver.warm_start(&mut velocities);
        }

        let mut data = SolverData {
            step,
            positions: &mut positions,
            velocities: &mut velocities,
        };

        for (&handle, jb) in self.joints.iter().zip(&joint_bodies) {
            if let Some(joint) = joints.get_mut(handle) {
                joint.kind.constraint_mut().init_velocity_constraints(jb, &mut data);
            }
        }

        for _ in 0..step.velocity_iterations {
            for (&handle, jb) in self.joints.iter().zip(&joint_bodies) {
                if let Some(joint) = joints.get_mut(handle) {
                    joint.kind.constraint_mut().solve_velocity_constraints(jb, &mut data);
                }
            }
            contact_solver.solve_velocity_constraints(data.velocities);
        }

        // Store impulses for warm starting the next step.
        let impulses: Vec<(ContactKey, ContactImpulse)> = keys
            .into_iter()
            .zip(contact_solver.impulses())
            .collect();
        for (key, impulse) in &impulses {
            if let Some(contact) = contacts.get_mut(key) {
                for j in 0..impulse.count {
                    contact.manifold.points[j].normal_impulse = impulse.normal_impulses[j];
                    contact.manifold.points[j].tangent_impulse = impulse.tangent_impulses[j];
                }
            }
        }

        for (position, velocity) in data.positions.iter_mut().zip(data.velocities.iter_mut()) {
            integrate_position(position, velocity, h);
        }

        let mut position_solved = false;
        for _ in 0..step.position_iterations {
            let mut joints_okay = true;
            for (&handle, jb) in self.joints.iter().zip(&joint_bodies) {
                if let Some(joint) = joints.get_mut(handle) {
                    let okay = joint.kind.constraint_mut().solve_position_constraints(jb, &mut data);
                    joints_okay = joints_okay && okay;
                }
            }
            let contacts_okay = contact_solver.solve_position_constraints(data.positions);

            if contacts_okay && joints_okay {
                position_solved = true;
                break;
            }
        }
        if !position_solved && step.position_iterations > 0 {
            debug!(
                bodies = self.bodies.len(),
                contacts = self.contacts.len(),
                joints = self.joints.len(),
                "position iterations exhausted"
            );
        }

        // Copy state back to the bodies.
        for &handle in &self.bodies {
            let Some(body) = bodies.get_mut(handle) else {
                continue;
            };
            let i = body.island_index;
            body.sweep.c = positions[i].c;
            body.sweep.a = positions[i].a;
            body.linear_velocity = velocities[i].v;
            body.angular_velocity = velocities[i].w;
            body.synchronize_transform();
        }

        let slept = allow_sleep && self.update_sleep(bodies, h, position_solved);

        IslandReport {
            impulses,
            position_solved,
            slept,
        }
    }

    /// Accumulates rest time and puts the island to sleep once every body
    /// has been slow long enough. Returns `true` if the island slept.
    fn update_sleep(&self, bodies: &mut SlotMap<BodyHandle, Body>, h: f64, position_solved: bool) -> bool {
        let lin_tol_sq = LINEAR_SLEEP_TOLERANCE * LINEAR_SLEEP_TOLERANCE;
        let ang_tol_sq = ANGULAR_SLEEP_TOLERANCE * ANGULAR_SLEEP_TOLERANCE;
        let mut min_sleep_time = f64::MAX;

        for &handle in &self.bodies {
            let Some(body) = bodies.get_mut(handle) else {
                continue;
            };
            if body.body_type == BodyType::Static {
                continue;
            }

            if !body.allow_sleep
                || body.angular_velocity * body.angular_velocity > ang_tol_sq
                || body.linear_velocity.magnitude_squared() > lin_tol_sq
            {
                body.sleep_time = 0.0;
                min_sleep_time = 0.0;
            } else {
                body.sleep_time += h;
                min_sleep_time = min_sleep_time.min(body.sleep_time);
            }
        }

        if min_sleep_time >= TIME_TO_SLEEP && position_solved {
            for &handle in &self.bodies {
                if let Some(body) = bodies.get_mut(handle) {
                    body.set_awake(false);
                }
            }
            return true;
        }
        false
    }
}
