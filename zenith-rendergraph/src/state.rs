use derive_more::{BitAnd, BitOr, BitOrAssign};
use crate::interface::ResourceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, BitOr, BitOrAssign, BitAnd)]
pub struct BarrierAccess(u32);

impl BarrierAccess {
    pub const NONE: Self = Self(0);
    pub const RENDER_TARGET: Self = Self(1 << 0);
    pub const DEPTH_STENCIL_WRITE: Self = Self(1 << 1);
    pub const DEPTH_STENCIL_READ: Self = Self(1 << 2);
    pub const SHADER_READ: Self = Self(1 << 3);
    pub const SHADER_WRITE: Self = Self(1 << 4);
    pub const INDIRECT_ARGUMENT: Self = Self(1 << 5);
    pub const INDEX_BUFFER: Self = Self(1 << 6);
    pub const VERTEX_BUFFER: Self = Self(1 << 7);
    pub const COPY_SOURCE: Self = Self(1 << 8);
    pub const COPY_DEST: Self = Self(1 << 9);

    const WRITE_MASK: u32 = Self::RENDER_TARGET.0 | Self::DEPTH_STENCIL_WRITE.0 | Self::SHADER_WRITE.0 | Self::COPY_DEST.0;

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn is_write(self) -> bool {
        self.0 & Self::WRITE_MASK != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, BitOr, BitOrAssign, BitAnd)]
pub struct BarrierStage(u32);

impl BarrierStage {
    pub const NONE: Self = Self(0);
    pub const VERTEX_SHADER: Self = Self(1 << 0);
    pub const PIXEL_SHADER: Self = Self(1 << 1);
    pub const COMPUTE_SHADER: Self = Self(1 << 2);
    pub const MESH_SHADER: Self = Self(1 << 3);
    pub const AMPLIFICATION_SHADER: Self = Self(1 << 4);
    pub const RENDER_TARGET: Self = Self(1 << 5);
    pub const DEPTH_STENCIL: Self = Self(1 << 6);
    pub const DRAW_INDIRECT: Self = Self(1 << 7);
    pub const INDEX_INPUT: Self = Self(1 << 8);
    pub const VERTEX_INPUT: Self = Self(1 << 9);
    pub const COPY: Self = Self(1 << 10);
    pub const CLEAR: Self = Self(1 << 11);

    pub const ALL_GRAPHICS: Self = Self(
        Self::VERTEX_SHADER.0 | Self::PIXEL_SHADER.0 | Self::MESH_SHADER.0 | Self::AMPLIFICATION_SHADER.0
    );

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageLayout {
    #[default]
    Undefined,
    RenderTarget,
    DepthStencilWrite,
    DepthStencilRead,
    ShaderRead,
    ShaderWrite,
    CopySource,
    CopyDest,
    Present,
}

/// Access, pipeline stage and (for images) layout of a resource at one point of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceState {
    pub access: BarrierAccess,
    pub stage: BarrierStage,
    pub layout: ImageLayout,
}

impl ResourceState {
    pub const UNDEFINED: Self = Self {
        access: BarrierAccess::NONE,
        stage: BarrierStage::NONE,
        layout: ImageLayout::Undefined,
    };

    pub const fn new(access: BarrierAccess, stage: BarrierStage, layout: ImageLayout) -> Self {
        Self {
            access,
            stage,
            layout,
        }
    }

    /// Whether moving from `previous` into this state needs no synchronization,
    /// which only holds for a read following an equal or narrower read.
    pub fn covers_read_after_read(&self, previous: &ResourceState) -> bool {
        !self.access.is_write()
            && !previous.access.is_write()
            && previous.access != BarrierAccess::NONE
            && self.access.contains(previous.access)
            && self.stage.contains(previous.stage)
            && self.layout == previous.layout
    }
}

/// Explicit state override for a resource access.
/// It replaces the state inferred from the access kind and the pass type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForcedState {
    IndirectArgument,
    IndexBuffer,
    VertexBuffer,
    CopySource,
    CopyDest,
    Clear,
}

pub(crate) fn default_write_state(resource_type: ResourceType, is_compute_pass: bool, is_depth: bool) -> ResourceState {
    match resource_type {
        ResourceType::Image if is_compute_pass => ResourceState::new(
            BarrierAccess::SHADER_WRITE,
            BarrierStage::COMPUTE_SHADER,
            ImageLayout::ShaderWrite,
        ),
        ResourceType::Image if is_depth => ResourceState::new(
            BarrierAccess::DEPTH_STENCIL_WRITE,
            BarrierStage::DEPTH_STENCIL,
            ImageLayout::DepthStencilWrite,
        ),
        ResourceType::Image => ResourceState::new(
            BarrierAccess::RENDER_TARGET,
            BarrierStage::RENDER_TARGET,
            ImageLayout::RenderTarget,
        ),
        ResourceType::Buffer | ResourceType::UniformBuffer => ResourceState::new(
            BarrierAccess::SHADER_WRITE,
            if is_compute_pass { BarrierStage::COMPUTE_SHADER } else { BarrierStage::ALL_GRAPHICS },
            ImageLayout::Undefined,
        ),
    }
}

pub(crate) fn default_read_state(resource_type: ResourceType, is_compute_pass: bool) -> ResourceState {
    match resource_type {
        ResourceType::Image => ResourceState::new(
            BarrierAccess::SHADER_READ,
            if is_compute_pass { BarrierStage::COMPUTE_SHADER } else { BarrierStage::PIXEL_SHADER | BarrierStage::VERTEX_SHADER },
            ImageLayout::ShaderRead,
        ),
        ResourceType::Buffer | ResourceType::UniformBuffer => ResourceState::new(
            BarrierAccess::SHADER_READ,
            if is_compute_pass { BarrierStage::COMPUTE_SHADER } else { BarrierStage::ALL_GRAPHICS },
            ImageLayout::Undefined,
        ),
    }
}

pub(crate) fn forced_resource_state(forced: ForcedState, resource_type: ResourceType, is_depth: bool) -> ResourceState {
    let image_layout = |layout| if resource_type == ResourceType::Image { layout } else { ImageLayout::Undefined };

    match forced {
        ForcedState::IndirectArgument => ResourceState::new(
            BarrierAccess::INDIRECT_ARGUMENT,
            BarrierStage::DRAW_INDIRECT,
            ImageLayout::Undefined,
        ),
        ForcedState::IndexBuffer => ResourceState::new(
            BarrierAccess::INDEX_BUFFER,
            BarrierStage::INDEX_INPUT,
            ImageLayout::Undefined,
        ),
        ForcedState::VertexBuffer => ResourceState::new(
            BarrierAccess::VERTEX_BUFFER,
            BarrierStage::VERTEX_INPUT,
            ImageLayout::Undefined,
        ),
        ForcedState::CopySource => ResourceState::new(
            BarrierAccess::COPY_SOURCE,
            BarrierStage::COPY,
            image_layout(ImageLayout::CopySource),
        ),
        ForcedState::CopyDest => ResourceState::new(
            BarrierAccess::COPY_DEST,
            BarrierStage::COPY,
            image_layout(ImageLayout::CopyDest),
        ),
        ForcedState::Clear if is_depth => ResourceState::new(
            BarrierAccess::DEPTH_STENCIL_WRITE,
            BarrierStage::CLEAR,
            ImageLayout::DepthStencilWrite,
        ),
        ForcedState::Clear => ResourceState::new(
            BarrierAccess::SHADER_WRITE,
            BarrierStage::CLEAR,
            image_layout(ImageLayout::ShaderWrite),
        ),
    }
}

/// State required by one access, the forced state wins over the inferred one.
pub(crate) fn required_state(
    resource_type: ResourceType,
    is_write: bool,
    is_compute_pass: bool,
    is_depth: bool,
    forced: Option<ForcedState>,
) -> ResourceState {
    match forced {
        Some(forced) => forced_resource_state(forced, resource_type, is_depth),
        None if is_write => default_write_state(resource_type, is_compute_pass, is_depth),
        None => default_read_state(resource_type, is_compute_pass),
    }
}
