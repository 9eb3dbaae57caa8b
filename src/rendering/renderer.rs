//! Renderer descriptors: fixed-function state bundles attached to nodes.

use std::collections::HashMap;

use log::trace;

/// Identifies a renderer in the [`RendererArena`].
///
/// Generational: packs to a u64 (generation high, index low) so the render
/// list reuse checksum sums stable ids instead of raw addresses.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RendererId {
    index: u32,
    generation: u32,
}

impl RendererId {
    fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn as_u64(self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }
}

/// Identifies a shader program registered with the [`ShaderArena`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct ShaderId(pub u32);

/// How source fragments are combined with the framebuffer.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum BlendMode {
    /// Blend only when the renderer is classified transparent.
    #[default]
    Auto,
    /// Always blend.
    On,
    /// Never blend.
    Off,
}

/// Stencil-buffer role of a renderer.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum StencilMode {
    /// Not involved in stencil operations.
    #[default]
    None,
    /// Writes the stencil mask other renderers in the layer test against.
    Mask,
}

/// One draw call's fixed-function state plus its uniform bindings.
///
/// A renderer holds no geometry or pixels itself; it references shader /
/// texture-set / geometry resources by id so the instruction builder can
/// sort for batch coherence without touching backend objects.
#[derive(Clone, Debug, Default)]
pub struct Renderer {
    pub blend_mode: BlendMode,
    pub stencil_mode: StencilMode,
    /// Whether this renderer needs depth testing against itself (e.g. a
    /// mesh with self-overlap; a flat image does not). Gates the
    /// single-opaque cheap path.
    pub requires_depth_test: bool,
    /// Drawn after everything else in the layer, no depth interaction.
    pub overlay: bool,
    /// Whether the renderer's content is fully opaque. Combined with node
    /// opacity to pick the opaque or transparent list.
    pub opaque: bool,
    /// Manual draw-order bias within a layer.
    pub depth_index: i32,
    /// Added to the computed Z value when sorting transparents.
    pub sort_modifier: f32,
    /// Batch-coherence sort keys.
    pub shader: ShaderId,
    pub texture_set: u32,
    pub geometry: u32,
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            opaque: true,
            ..Self::default()
        }
    }
}

/// Strength of a uniform-block to shader connection.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConnectionStrength {
    /// Extends the shader's lifetime until disconnected.
    Strong,
    /// Observes only; the shader may be destroyed underneath.
    Weak,
}

/// A named uniform map (property index -> graphics location) that can be
/// connected to shaders.
///
/// Exactly one connection per (block, shader) pair is permitted at a time;
/// connecting twice is a programmer error.
#[derive(Debug, Default)]
pub struct UniformBlock {
    /// Property index to backend uniform location.
    pub uniforms: HashMap<u32, u32>,
    connections: Vec<(ShaderId, ConnectionStrength)>,
}

impl UniformBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect this block to a shader.
    ///
    /// # Panics
    ///
    /// Panics if the pair is already connected.
    pub fn connect(&mut self, shaders: &mut ShaderArena, shader: ShaderId, strength: ConnectionStrength) {
        assert!(
            !self.connections.iter().any(|(s, _)| *s == shader),
            "Uniform block is already connected to this shader"
        );
        if strength == ConnectionStrength::Strong {
            shaders.add_strong_ref(shader);
        }
        self.connections.push((shader, strength));
    }

    /// Disconnect from a shader. Unknown pairs are ignored.
    pub fn disconnect(&mut self, shaders: &mut ShaderArena, shader: ShaderId) {
        if let Some(pos) = self.connections.iter().position(|(s, _)| *s == shader) {
            let (_, strength) = self.connections.remove(pos);
            if strength == ConnectionStrength::Strong {
                shaders.release_strong_ref(shader);
            }
        }
    }

    /// Drop every connection, releasing strong references.
    pub fn disconnect_all(&mut self, shaders: &mut ShaderArena) {
        for (shader, strength) in self.connections.drain(..) {
            if strength == ConnectionStrength::Strong {
                shaders.release_strong_ref(shader);
            }
        }
    }

    pub fn is_connected(&self, shader: ShaderId) -> bool {
        self.connections.iter().any(|(s, _)| *s == shader)
    }
}

struct ShaderSlot {
    strong_refs: u32,
    /// Destruction was requested but strong references keep it alive.
    doomed: bool,
    alive: bool,
}

/// Registry of shader lifetimes.
///
/// Destruction is deferred, not immediate: a strongly connected shader
/// survives until the last strong reference is released, so update-thread
/// objects referencing it for the frame in flight remain valid.
#[derive(Default)]
pub struct ShaderArena {
    slots: Vec<ShaderSlot>,
}

impl ShaderArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self) -> ShaderId {
        self.slots.push(ShaderSlot {
            strong_refs: 0,
            doomed: false,
            alive: true,
        });
        ShaderId((self.slots.len() - 1) as u32)
    }

    pub fn is_alive(&self, id: ShaderId) -> bool {
        self.slots
            .get(id.0 as usize)
            .map(|s| s.alive)
            .unwrap_or(false)
    }

    /// Request destruction. Frees immediately when nothing strong holds the
    /// shader, otherwise defers until the last strong reference goes.
    pub fn request_destroy(&mut self, id: ShaderId) {
        if let Some(slot) = self.slots.get_mut(id.0 as usize) {
            if slot.strong_refs == 0 {
                slot.alive = false;
            } else {
                trace!("shader {:?} destruction deferred ({} strong refs)", id, slot.strong_refs);
                slot.doomed = true;
            }
        }
    }

    fn add_strong_ref(&mut self, id: ShaderId) {
        if let Some(slot) = self.slots.get_mut(id.0 as usize) {
            slot.strong_refs += 1;
        }
    }

    fn release_strong_ref(&mut self, id: ShaderId) {
        if let Some(slot) = self.slots.get_mut(id.0 as usize) {
            slot.strong_refs = slot.strong_refs.saturating_sub(1);
            if slot.strong_refs == 0 && slot.doomed {
                slot.alive = false;
            }
        }
    }
}

struct RendererSlot {
    renderer: Renderer,
    id: RendererId,
}

/// Generational arena owning every renderer in the scene.
pub struct RendererArena {
    dense: Vec<RendererSlot>,
    sparse: Vec<Option<(usize, u32)>>,
    free_indices: Vec<u32>,
}

impl Default for RendererArena {
    fn default() -> Self {
        Self::new()
    }
}

impl RendererArena {
    pub fn new() -> Self {
        Self {
            dense: Vec::new(),
            sparse: Vec::new(),
            free_indices: Vec::new(),
        }
    }

    pub fn insert(&mut self, renderer: Renderer) -> RendererId {
        let id = if let Some(index) = self.free_indices.pop() {
            let entry = self.sparse[index as usize]
                .as_mut()
                .expect("free slot keeps its entry");
            entry.0 = self.dense.len();
            RendererId::new(index, entry.1)
        } else {
            let index = self.sparse.len() as u32;
            self.sparse.push(Some((self.dense.len(), 0)));
            RendererId::new(index, 0)
        };
        self.dense.push(RendererSlot { renderer, id });
        id
    }

    fn dense_index(&self, id: RendererId) -> Option<usize> {
        match self.sparse.get(id.index as usize) {
            Some(Some((dense_index, generation))) if *generation == id.generation => {
                let slot = self.dense.get(*dense_index)?;
                (slot.id == id).then_some(*dense_index)
            }
            _ => None,
        }
    }

    pub fn get(&self, id: RendererId) -> Option<&Renderer> {
        self.dense_index(id).map(|i| &self.dense[i].renderer)
    }

    pub fn get_mut(&mut self, id: RendererId) -> Option<&mut Renderer> {
        self.dense_index(id).map(|i| &mut self.dense[i].renderer)
    }

    pub fn remove(&mut self, id: RendererId) {
        let Some(dense_index) = self.dense_index(id) else {
            return;
        };
        self.dense.swap_remove(dense_index);
        if dense_index < self.dense.len() {
            let moved = self.dense[dense_index].id;
            if let Some(Some(entry)) = self.sparse.get_mut(moved.index as usize) {
                entry.0 = dense_index;
            }
        }
        if let Some(Some(entry)) = self.sparse.get_mut(id.index as usize) {
            entry.1 = entry.1.wrapping_add(1);
            self.free_indices.push(id.index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_renderer_is_opaque_with_default_shader() {
        let r = Renderer::new();
        assert!(r.opaque);
        assert_eq!(r.shader, ShaderId::default());
    }

    #[test]
    fn test_arena_generations() {
        let mut arena = RendererArena::new();
        let a = arena.insert(Renderer::new());
        arena.remove(a);
        let b = arena.insert(Renderer::new());
        assert!(arena.get(a).is_none());
        assert!(arena.get(b).is_some());
        assert_ne!(a.as_u64(), b.as_u64());
    }

    #[test]
    fn test_strong_connection_defers_shader_destruction() {
        let mut shaders = ShaderArena::new();
        let shader = shaders.register();
        let mut block = UniformBlock::new();

        block.connect(&mut shaders, shader, ConnectionStrength::Strong);
        shaders.request_destroy(shader);
        assert!(shaders.is_alive(shader), "strong ref must extend lifetime");

        block.disconnect(&mut shaders, shader);
        assert!(!shaders.is_alive(shader));
    }

    #[test]
    fn test_weak_connection_does_not_extend_lifetime() {
        let mut shaders = ShaderArena::new();
        let shader = shaders.register();
        let mut block = UniformBlock::new();

        block.connect(&mut shaders, shader, ConnectionStrength::Weak);
        shaders.request_destroy(shader);
        assert!(!shaders.is_alive(shader));
    }

    #[test]
    #[should_panic(expected = "already connected")]
    fn test_double_connection_is_programmer_error() {
        let mut shaders = ShaderArena::new();
        let shader = shaders.register();
        let mut block = UniformBlock::new();
        block.connect(&mut shaders, shader, ConnectionStrength::Weak);
        block.connect(&mut shaders, shader, ConnectionStrength::Strong);
    }
}
