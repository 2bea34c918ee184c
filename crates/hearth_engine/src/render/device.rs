//! Graphics device interface
//!
//! The renderer drives the GPU through the small command-oriented
//! [`GraphicsDevice`] trait: passes, pipelines, bindings, uniforms, draws and
//! a per-frame commit. Window and swapchain management live behind it.
//! [`RecordingDevice`] validates command order and keeps the command stream
//! of each committed frame for inspection.

use super::RenderError;
use bitflags::bitflags;
use parking_lot::Mutex;
use std::sync::Arc;

/// Handle to uploaded mesh geometry (vertex and index buffers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u32);

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

impl TextureHandle {
    /// Depth texture written by the shadow pass
    pub const SHADOW_MAP: Self = Self(u32::MAX);
    /// Color target of the main, skybox and sprite passes
    pub const OFFSCREEN: Self = Self(u32::MAX - 1);
    /// 1x1 white texture used when a mesh has no texture
    pub const WHITE: Self = Self(u32::MAX - 2);
}

/// Render target of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    /// Depth-only shadow map
    ShadowMap,
    /// Offscreen color + depth target
    Offscreen,
    /// Presentation surface
    Swapchain,
}

bitflags! {
    /// Attachments cleared when a pass begins
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        /// Clear the color attachment
        const COLOR = 0b01;
        /// Clear the depth attachment
        const DEPTH = 0b10;
    }
}

/// Description of a render pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassDesc {
    /// Target the pass renders into
    pub target: RenderTarget,
    /// Attachments cleared on begin; everything else is loaded
    pub clear: ClearFlags,
    /// Clear color used when `clear` contains [`ClearFlags::COLOR`]
    pub clear_color: [f32; 4],
}

impl PassDesc {
    /// Pass that clears the given attachments
    pub fn clearing(target: RenderTarget, clear: ClearFlags, clear_color: [f32; 4]) -> Self {
        Self {
            target,
            clear,
            clear_color,
        }
    }

    /// Pass that keeps the previous contents of its target
    pub fn loading(target: RenderTarget) -> Self {
        Self::clearing(target, ClearFlags::empty(), [0.0; 4])
    }
}

/// Pipelines created by the renderer at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pipeline {
    /// Depth-only model rendering from the light's point of view
    ShadowDepth,
    /// Lit, shadowed model rendering
    Lit,
    /// Cube-mapped background at maximum depth
    Skybox,
    /// Opaque sprites (depth write on, no blending)
    SpriteOpaque,
    /// Alpha-blended sprites (depth test only)
    SpriteAlpha,
    /// Fullscreen copy of the offscreen target
    Blit,
}

/// Resources bound for subsequent draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bindings {
    /// Geometry; `None` draws procedurally generated vertices
    pub mesh: Option<MeshHandle>,
    /// Texture slots: 0 is the material texture, 1 the shadow map
    pub textures: [Option<TextureHandle>; 2],
}

impl Bindings {
    /// Bindings with a mesh and a single texture
    pub fn mesh(mesh: MeshHandle, texture: Option<TextureHandle>) -> Self {
        Self {
            mesh: Some(mesh),
            textures: [texture, None],
        }
    }

    /// Bindings with only a texture
    pub fn texture(texture: TextureHandle) -> Self {
        Self {
            mesh: None,
            textures: [Some(texture), None],
        }
    }

    /// Builder pattern: Bind the shadow map to slot 1
    pub fn with_shadow_map(mut self) -> Self {
        self.textures[1] = Some(TextureHandle::SHADOW_MAP);
        self
    }
}

/// Uniform block slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformSlot {
    /// Camera view-projection and position
    Frame,
    /// Light-space matrix of the shadow caster
    LightSpace,
    /// Per-frame light block
    Lights,
    /// Per-draw model matrix and tint
    Object,
    /// Per-batch sprite instance array
    SpriteInstances,
}

/// One command as seen by the device
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    /// A pass began
    BeginPass(PassDesc),
    /// The current pass ended
    EndPass,
    /// A pipeline was applied
    ApplyPipeline(Pipeline),
    /// Resources were bound
    ApplyBindings(Bindings),
    /// A uniform block was uploaded
    ApplyUniforms {
        /// Target slot
        slot: UniformSlot,
        /// Raw block contents
        data: Vec<u8>,
    },
    /// A draw was issued
    Draw {
        /// First element
        base_element: u32,
        /// Number of elements
        element_count: u32,
        /// Number of instances
        instances: u32,
    },
}

/// Command interface to the GPU
pub trait GraphicsDevice: Send {
    /// Begin a pass; passes do not nest
    fn begin_pass(&mut self, pass: &PassDesc) -> Result<(), RenderError>;

    /// End the current pass
    fn end_pass(&mut self) -> Result<(), RenderError>;

    /// Apply a pipeline inside a pass
    fn apply_pipeline(&mut self, pipeline: Pipeline) -> Result<(), RenderError>;

    /// Bind resources for subsequent draws
    fn apply_bindings(&mut self, bindings: &Bindings) -> Result<(), RenderError>;

    /// Upload a uniform block
    fn apply_uniforms(&mut self, slot: UniformSlot, data: &[u8]) -> Result<(), RenderError>;

    /// Issue a draw with the current pipeline and bindings
    fn draw(&mut self, base_element: u32, element_count: u32, instances: u32) -> Result<(), RenderError>;

    /// Submit the frame and present
    fn commit(&mut self) -> Result<(), RenderError>;
}

#[derive(Debug, Default)]
struct Recording {
    current: Vec<GpuCommand>,
    last_frame: Vec<GpuCommand>,
    frames_committed: u64,
    in_pass: Option<RenderTarget>,
    pipeline_applied: bool,
}

impl Recording {
    fn require_pass(&self, command: &str) -> Result<(), RenderError> {
        if self.in_pass.is_none() {
            return Err(RenderError::InvalidCommandOrder(format!("{command} outside of a pass")));
        }
        Ok(())
    }
}

/// Headless device that validates and records the command stream
///
/// Clones share the same recording, so a test can keep a clone while the
/// engine owns the device.
#[derive(Debug, Clone, Default)]
pub struct RecordingDevice {
    recording: Arc<Mutex<Recording>>,
}

impl RecordingDevice {
    /// Create an empty recording device
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands of the most recently committed frame
    pub fn last_frame(&self) -> Vec<GpuCommand> {
        self.recording.lock().last_frame.clone()
    }

    /// Commands issued since the last commit
    pub fn pending(&self) -> Vec<GpuCommand> {
        self.recording.lock().current.clone()
    }

    /// Number of committed frames
    pub fn frames_committed(&self) -> u64 {
        self.recording.lock().frames_committed
    }

    fn record(&self, command: GpuCommand) {
        self.recording.lock().current.push(command);
    }
}

impl GraphicsDevice for RecordingDevice {
    fn begin_pass(&mut self, pass: &PassDesc) -> Result<(), RenderError> {
        {
            let mut recording = self.recording.lock();
            if let Some(target) = recording.in_pass {
                return Err(RenderError::InvalidCommandOrder(format!(
                    "begin_pass({:?}) while a {target:?} pass is open",
                    pass.target
                )));
            }
            recording.in_pass = Some(pass.target);
            recording.pipeline_applied = false;
        }
        self.record(GpuCommand::BeginPass(*pass));
        Ok(())
    }

    fn end_pass(&mut self) -> Result<(), RenderError> {
        {
            let mut recording = self.recording.lock();
            recording.require_pass("end_pass")?;
            recording.in_pass = None;
        }
        self.record(GpuCommand::EndPass);
        Ok(())
    }

    fn apply_pipeline(&mut self, pipeline: Pipeline) -> Result<(), RenderError> {
        {
            let mut recording = self.recording.lock();
            recording.require_pass("apply_pipeline")?;
            recording.pipeline_applied = true;
        }
        self.record(GpuCommand::ApplyPipeline(pipeline));
        Ok(())
    }

    fn apply_bindings(&mut self, bindings: &Bindings) -> Result<(), RenderError> {
        self.recording.lock().require_pass("apply_bindings")?;
        self.record(GpuCommand::ApplyBindings(*bindings));
        Ok(())
    }

    fn apply_uniforms(&mut self, slot: UniformSlot, data: &[u8]) -> Result<(), RenderError> {
        self.recording.lock().require_pass("apply_uniforms")?;
        self.record(GpuCommand::ApplyUniforms {
            slot,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn draw(&mut self, base_element: u32, element_count: u32, instances: u32) -> Result<(), RenderError> {
        {
            let recording = self.recording.lock();
            recording.require_pass("draw")?;
            if !recording.pipeline_applied {
                return Err(RenderError::InvalidCommandOrder("draw without a pipeline".to_string()));
            }
        }
        self.record(GpuCommand::Draw {
            base_element,
            element_count,
            instances,
        });
        Ok(())
    }

    fn commit(&mut self) -> Result<(), RenderError> {
        let mut recording = self.recording.lock();
        if let Some(target) = recording.in_pass {
            return Err(RenderError::InvalidCommandOrder(format!(
                "commit while a {target:?} pass is open"
            )));
        }
        recording.last_frame = std::mem::take(&mut recording.current);
        recording.frames_committed += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_keeps_committed_frame() {
        let mut device = RecordingDevice::new();
        let probe = device.clone();

        device.begin_pass(&PassDesc::loading(RenderTarget::Swapchain)).unwrap();
        device.apply_pipeline(Pipeline::Blit).unwrap();
        device.draw(0, 3, 1).unwrap();
        device.end_pass().unwrap();
        assert_eq!(probe.pending().len(), 4);

        device.commit().unwrap();

        assert_eq!(probe.frames_committed(), 1);
        assert_eq!(probe.last_frame().len(), 4);
        assert!(probe.pending().is_empty());
    }

    #[test]
    fn test_nested_pass_rejected() {
        let mut device = RecordingDevice::new();
        device.begin_pass(&PassDesc::loading(RenderTarget::Offscreen)).unwrap();

        let result = device.begin_pass(&PassDesc::loading(RenderTarget::Swapchain));
        assert!(matches!(result, Err(RenderError::InvalidCommandOrder(_))));
    }

    #[test]
    fn test_draw_requires_pipeline() {
        let mut device = RecordingDevice::new();
        assert!(device.draw(0, 3, 1).is_err());

        device.begin_pass(&PassDesc::loading(RenderTarget::Offscreen)).unwrap();
        assert!(device.draw(0, 3, 1).is_err());
    }

    #[test]
    fn test_commit_inside_pass_rejected() {
        let mut device = RecordingDevice::new();
        device.begin_pass(&PassDesc::loading(RenderTarget::Offscreen)).unwrap();
        assert!(device.commit().is_err());
    }

    #[test]
    fn test_clear_flags() {
        let pass = PassDesc::clearing(RenderTarget::Offscreen, ClearFlags::COLOR | ClearFlags::DEPTH, [0.0; 4]);
        assert!(pass.clear.contains(ClearFlags::DEPTH));
        assert!(PassDesc::loading(RenderTarget::Offscreen).clear.is_empty());
    }
}
