//! A retained-mode scene-graph engine core.
//!
//! The crate models the update side of a UI engine: a node tree with
//! double-buffered properties, multi-touch gesture recognition, resize
//! negotiation, and a render-instruction builder whose ordered, flagged
//! item lists are the sole interface to a graphics backend.
//!
//! The frame loop lives in [`Core::update`](core::Core::update): drain
//! messages, advance gestures, negotiate layout, refresh world matrices,
//! build render instructions, flush deferred teardown, flip the buffer
//! index. Every mutable scene value keeps two copies addressed by that
//! index, so an in-flight render pass never races a writer.

pub mod core;
pub mod gestures;
pub mod math;
pub mod messages;
pub mod node;
pub mod property;
pub mod relayout;
pub mod rendering;

pub mod prelude {
    pub use crate::core::{Core, Scene};
    pub use crate::gestures::{
        GestureProcessor, GestureState, PanGesture, PanGestureDetector, TapGesture,
        TapGestureDetector, TouchEvent, TouchPoint,
    };
    pub use crate::math::{Matrix, Quaternion, Vector2, Vector3, Vector4};
    pub use crate::messages::MessageSender;
    pub use crate::node::{NodeId, NodeTree};
    pub use crate::property::{BufferIndex, DoubleBuffered};
    pub use crate::relayout::{Dimension, RelayoutController, ResizePolicy};
    pub use crate::rendering::{
        Layer, LayerBehavior, RenderFlags, RenderInstruction, Renderer, RendererArena,
    };
}
