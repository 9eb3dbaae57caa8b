//! Per-draw-call state descriptors and the render-instruction builder.
//!
//! Nothing here talks to a graphics API. The ordered, flagged
//! [`RenderList`](instructions::RenderList)s produced once per frame are
//! the sole interface handed to the backend.

pub mod instructions;
pub mod layer;
pub mod renderer;

pub use instructions::{RenderFlags, RenderInstruction, RenderInstructionBuilder, RenderItem, RenderList};
pub use layer::{Layer, LayerBehavior, RenderCategory};
pub use renderer::{
    BlendMode, ConnectionStrength, Renderer, RendererArena, RendererId, ShaderArena, ShaderId,
    StencilMode, UniformBlock,
};
