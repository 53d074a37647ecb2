use super::{RenderNode, RenderNodeReference, RenderObject, RenderStage};
use strata_api::{BlendState, CullMode, FillMode, PipelineStateDescription, PrimitiveTopology};

/// Patches the pipeline state of a single render node right before it is finalized. Runs once per
/// node per frame, so implementations should not allocate.
pub trait PipelineProcessor: Send + Sync {
    /// Stages this processor acts on. Used to keep stages from being removed while a processor
    /// still refers to them.
    fn render_stages(&self) -> Vec<RenderStage> {
        Vec::new()
    }

    fn process(
        &self,
        render_node_reference: RenderNodeReference,
        render_node: &RenderNode,
        render_object: &RenderObject,
        pipeline_state: &mut PipelineStateDescription,
    );
}

/// Draws a stage as wireframe without backface culling
pub struct WireframePipelineProcessor {
    pub render_stage: RenderStage,
}

impl PipelineProcessor for WireframePipelineProcessor {
    fn render_stages(&self) -> Vec<RenderStage> {
        vec![self.render_stage.clone()]
    }

    fn process(
        &self,
        _render_node_reference: RenderNodeReference,
        render_node: &RenderNode,
        _render_object: &RenderObject,
        pipeline_state: &mut PipelineStateDescription,
    ) {
        if render_node.render_stage_index == self.render_stage.index() {
            pipeline_state.rasterizer_state.fill_mode = FillMode::Wireframe;
            pipeline_state.rasterizer_state.cull_mode = CullMode::None;
        }
    }
}

/// Alpha blending without depth writes for the transparent stage
pub struct TransparentBlendPipelineProcessor {
    pub transparent_render_stage: RenderStage,
}

impl PipelineProcessor for TransparentBlendPipelineProcessor {
    fn render_stages(&self) -> Vec<RenderStage> {
        vec![self.transparent_render_stage.clone()]
    }

    fn process(
        &self,
        _render_node_reference: RenderNodeReference,
        render_node: &RenderNode,
        _render_object: &RenderObject,
        pipeline_state: &mut PipelineStateDescription,
    ) {
        if render_node.render_stage_index == self.transparent_render_stage.index() {
            pipeline_state.blend_state = BlendState::default_alpha_enabled();
            pipeline_state.depth_state.depth_write_enable = false;
        }
    }
}

/// Depth bias and clamping for shadow map casters, to avoid acne and clipping near the light
pub struct ShadowMapPipelineProcessor {
    pub shadow_map_render_stage: RenderStage,
    pub depth_bias: i32,
    pub depth_bias_slope_scaled: f32,
    pub depth_clamp_enable: bool,
}

impl ShadowMapPipelineProcessor {
    pub fn new(shadow_map_render_stage: RenderStage) -> Self {
        ShadowMapPipelineProcessor {
            shadow_map_render_stage,
            depth_bias: 2,
            depth_bias_slope_scaled: 1.5,
            depth_clamp_enable: true,
        }
    }
}

impl PipelineProcessor for ShadowMapPipelineProcessor {
    fn render_stages(&self) -> Vec<RenderStage> {
        vec![self.shadow_map_render_stage.clone()]
    }

    fn process(
        &self,
        _render_node_reference: RenderNodeReference,
        render_node: &RenderNode,
        _render_object: &RenderObject,
        pipeline_state: &mut PipelineStateDescription,
    ) {
        if render_node.render_stage_index == self.shadow_map_render_stage.index() {
            let rasterizer_state = &mut pipeline_state.rasterizer_state;
            rasterizer_state.depth_bias = self.depth_bias;
            rasterizer_state.depth_bias_slope_scaled = self.depth_bias_slope_scaled;
            rasterizer_state.depth_clamp_enable = self.depth_clamp_enable;
        }
    }
}

/// Switches a stage to patch lists so a tessellation-enabled effect can be bound
pub struct TessellationPipelineProcessor {
    pub render_stage: RenderStage,
}

impl PipelineProcessor for TessellationPipelineProcessor {
    fn render_stages(&self) -> Vec<RenderStage> {
        vec![self.render_stage.clone()]
    }

    fn process(
        &self,
        _render_node_reference: RenderNodeReference,
        render_node: &RenderNode,
        _render_object: &RenderObject,
        pipeline_state: &mut PipelineStateDescription,
    ) {
        if render_node.render_stage_index == self.render_stage.index() {
            pipeline_state.primitive_topology = PrimitiveTopology::PatchList;
            pipeline_state.tessellation_enabled = true;
        }
    }
}
