//! Frame graph: declare passes and the resources they touch, compile, then record.
//!
//! Compilation culls passes nothing depends on and plans every state transition. Execution
//! materializes transient resources lazily, recycles them through a [`TransientResourcePool`]
//! and records through the injected [`CommandContext`].

mod barrier;
mod blackboard;
mod builder;
mod config;
mod context;
mod culling;
mod descriptor;
mod error;
mod execution_thread;
mod graph;
mod interface;
mod node;
mod resource;
mod rhi;
mod state;
mod transient;

#[cfg(any(debug_assertions, feature = "resource-tracking"))]
pub mod diagnostics;

#[cfg(test)]
mod testing;

pub use barrier::PassBarrier;
pub use blackboard::{Blackboard, MAX_BLACKBOARD_ENTRY_SIZE};
pub use builder::{ExtractedResource, PassBuilder, RenderGraphBuilder};
pub use config::{ExecutionMode, RenderGraphConfig, RenderGraphConfigBuilder};
pub use context::RenderContext;
pub use descriptor::{BufferDesc, BufferUsage, ClearMode, ImageDesc, ImageFormat, ImageUsage, MemoryUsage};
pub use error::RenderGraphError;
pub use execution_thread::RenderGraphExecutionThread;
pub use graph::{CompiledRenderGraph, ExecutionReport};
pub use interface::{Buffer, BufferResource, Image, ResourceDescriptor, ResourceType, UniformBuffer};
pub use node::{RenderGraphPass, RenderGraphPassNode};
pub use resource::{
    GraphResource, GraphResourceId, PhysicalResource, PhysicalResourceId,
    RenderGraphBuffer, RenderGraphImage, RenderGraphResource, RenderGraphUniformBuffer,
};
pub use rhi::{AttachmentInfo, CommandContext, PipelineHandle, RenderingInfo, ResourceBarrierInfo, ResourceFactory, RhiResource};
pub use state::{BarrierAccess, BarrierStage, ForcedState, ImageLayout, ResourceState};
pub use transient::{TransientResourcePool, TransientResourceSystem};
