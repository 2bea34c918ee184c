//! Game systems
//!
//! Everything here runs in the game-logic phase, after the physics poses
//! have been written back and before the render queue reads them.

use crate::components::{CameraMode, CameraRig, Flicker, PlayerController, Spinner};
use crate::table::CardTable;
use hearth_engine::ecs::components::TransformComponent;
use hearth_engine::ecs::{hierarchy, FrameContext, Phase, System, SystemAccess, SystemError, SystemScheduler};
use hearth_engine::foundation::math::{Quat, Vec3};
use hearth_engine::input::{Action, MouseButton};
use hearth_engine::physics::CharacterControllerState;
use hearth_engine::render::LightComponent;

/// Plays the card table and keeps its sprites in sync
#[derive(Debug, Default)]
pub struct CardTableSystem;

impl System for CardTableSystem {
    fn name(&self) -> &str {
        "card_table"
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new().writes::<CardTable>()
    }

    fn run(&mut self, ctx: &FrameContext) -> Result<(), SystemError> {
        let Some(mut table) = ctx.world.resource_mut::<CardTable>() else {
            return Ok(());
        };

        let redraw = table
            .update(ctx.delta(), &ctx.input)
            .map_err(|e| SystemError::Failed(format!("card table: {e}")))?;
        if redraw {
            let changed = table.sync_sprites(&ctx.scene)?;
            log::trace!("{changed} card sprites updated");
        }
        Ok(())
    }
}

/// Moves camera rigs from mouse input and places their cameras
#[derive(Debug, Default)]
pub struct CameraControlSystem;

impl System for CameraControlSystem {
    fn name(&self) -> &str {
        "camera_control"
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new().writes::<CameraRig>().writes::<TransformComponent>()
    }

    fn run(&mut self, ctx: &FrameContext) -> Result<(), SystemError> {
        let mut rigs = ctx.world.write::<CameraRig>();
        let mut transforms = ctx.world.write::<TransformComponent>();
        let toggle = ctx.input.pressed_once(Action::ToggleCamera);
        let delta = ctx.input.mouse_delta();

        for (entity, rig) in rigs.iter_mut() {
            if toggle {
                rig.toggle();
                log::debug!("camera {entity} switched to {:?}", rig.mode);
            }
            if rig.mode == CameraMode::FirstPerson || ctx.input.mouse_pressed(MouseButton::Right) {
                rig.look(delta);
            }

            let parent = transforms.get(entity).and_then(|transform| transform.parent);
            match rig.mode {
                CameraMode::Orbit => {
                    // Orbit whatever the camera rides on
                    if let Some(parent) = parent {
                        let anchor = hierarchy::try_calculate_world_transform(&transforms, parent)?;
                        rig.target = anchor.translation + Vec3::new(0.0, rig.eye_height, 0.0);
                    }
                    hierarchy::set_local_from_world(&mut transforms, entity, rig.orbit_pose())?;
                }
                CameraMode::FirstPerson => {
                    if let Some(transform) = transforms.get_mut(entity) {
                        transform.local = rig.first_person_pose();
                    }
                }
            }
        }
        Ok(())
    }
}

/// Turns movement actions into character controller requests
#[derive(Debug, Default)]
pub struct PlayerMovementSystem;

impl System for PlayerMovementSystem {
    fn name(&self) -> &str {
        "player_movement"
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new()
            .reads::<CameraRig>()
            .reads::<PlayerController>()
            .writes::<CharacterControllerState>()
    }

    fn run(&mut self, ctx: &FrameContext) -> Result<(), SystemError> {
        let rigs = ctx.world.read::<CameraRig>();
        let players = ctx.world.read::<PlayerController>();
        let mut states = ctx.world.write::<CharacterControllerState>();

        // Movement is relative to the view heading
        let Some((forward, right)) = rigs.iter().next().map(|(_, rig)| (rig.forward_flat(), rig.right_flat())) else {
            return Ok(());
        };

        let mut direction = Vec3::zeros();
        if ctx.input.pressed(Action::MoveForward) {
            direction += forward;
        }
        if ctx.input.pressed(Action::MoveBack) {
            direction -= forward;
        }
        if ctx.input.pressed(Action::MoveRight) {
            direction += right;
        }
        if ctx.input.pressed(Action::MoveLeft) {
            direction -= right;
        }
        let direction = direction.try_normalize(1e-6).unwrap_or_else(Vec3::zeros);
        let jump = ctx.input.pressed_once(Action::Jump);

        for (entity, player) in players.iter() {
            if let Some(state) = states.get_mut(entity) {
                state.desired_velocity = direction * player.speed;
                state.jump_requested |= jump;
            }
        }
        Ok(())
    }
}

/// Applies [`Spinner`] rotations
#[derive(Debug, Default)]
pub struct SpinSystem;

impl System for SpinSystem {
    fn name(&self) -> &str {
        "spin"
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new().reads::<Spinner>().writes::<TransformComponent>()
    }

    fn run(&mut self, ctx: &FrameContext) -> Result<(), SystemError> {
        let spinners = ctx.world.read::<Spinner>();
        let mut transforms = ctx.world.write::<TransformComponent>();

        for (entity, spinner) in spinners.iter() {
            if let Some(transform) = transforms.get_mut(entity) {
                let step = Quat::from_axis_angle(&spinner.axis, spinner.speed * ctx.delta());
                transform.local.rotation = transform.local.rotation * step;
            }
        }
        Ok(())
    }
}

/// Drives [`Flicker`] lights from the elapsed time
#[derive(Debug, Default)]
pub struct LampFlickerSystem;

impl System for LampFlickerSystem {
    fn name(&self) -> &str {
        "lamp_flicker"
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new().reads::<Flicker>().writes::<LightComponent>()
    }

    fn run(&mut self, ctx: &FrameContext) -> Result<(), SystemError> {
        let flickers = ctx.world.read::<Flicker>();
        let mut lights = ctx.world.write::<LightComponent>();

        let time = ctx.time.elapsed as f32;
        for (entity, flicker) in flickers.iter() {
            if let Some(light) = lights.get_mut(entity) {
                light.intensity = flicker.intensity_at(time);
            }
        }
        Ok(())
    }
}

/// Register the card table systems
pub fn add_card_table_systems(scheduler: &mut SystemScheduler) {
    scheduler.add_system(Phase::GameLogic, CardTableSystem);
    scheduler.add_system(Phase::GameLogic, LampFlickerSystem);
}

/// Register the cube scene systems
pub fn add_cube_scene_systems(scheduler: &mut SystemScheduler) {
    scheduler.add_system(Phase::GameLogic, CameraControlSystem);
    scheduler.add_system(Phase::GameLogic, PlayerMovementSystem);
    scheduler.add_system(Phase::GameLogic, SpinSystem);
    scheduler.add_system(Phase::GameLogic, LampFlickerSystem);
}
