use crate::stages::OwnedRenderStages;
use crate::{ForwardPipelinePlugin, MESH_RENDER_OBJECT_TYPE, SHADOW_MAP_RENDER_STAGE_NAME};
use parking_lot::Mutex;
use std::sync::Arc;
use strata_api::StrataResult;
use strata_framework::render_stages::{
    PipelineProcessorId, RenderGroupMask, RenderStage, RenderStageSelectorId, RenderSystem,
    ShadowMapPipelineProcessor, ShadowMapRenderStageSelector, SortMode,
};
use strata_renderer::{PipelinePlugin, PipelinePluginContext};

pub const MESH_SHADOW_EFFECT_NAME: &str = "MeshShadow";

#[derive(Default)]
struct ShadowMapPipelineState {
    owned_render_stages: OwnedRenderStages,
    shadow_map_render_stage: Option<RenderStage>,
    selector: Option<RenderStageSelectorId>,
    pipeline_processor: Option<PipelineProcessorId>,
}

impl ShadowMapPipelineState {
    fn load(
        &mut self,
        render_system: &mut RenderSystem,
    ) -> StrataResult<()> {
        let shadow_map_render_stage = self.owned_render_stages.find_or_add(
            render_system,
            SHADOW_MAP_RENDER_STAGE_NAME,
            SortMode::FrontToBack,
        )?;
        self.shadow_map_render_stage = Some(shadow_map_render_stage.clone());

        let selector = ShadowMapRenderStageSelector::new(
            RenderGroupMask::ALL,
            shadow_map_render_stage.clone(),
            MESH_SHADOW_EFFECT_NAME,
        );
        self.selector = Some(
            render_system.add_render_stage_selector(MESH_RENDER_OBJECT_TYPE, Arc::new(selector))?,
        );

        let pipeline_processor = ShadowMapPipelineProcessor::new(shadow_map_render_stage);
        self.pipeline_processor = Some(
            render_system
                .add_pipeline_processor(MESH_RENDER_OBJECT_TYPE, Arc::new(pipeline_processor))?,
        );

        Ok(())
    }

    fn unload(
        &mut self,
        render_system: &mut RenderSystem,
    ) -> StrataResult<()> {
        if let Some(id) = self.pipeline_processor.take() {
            render_system.remove_pipeline_processor(MESH_RENDER_OBJECT_TYPE, id)?;
        }

        if let Some(id) = self.selector.take() {
            render_system.remove_render_stage_selector(MESH_RENDER_OBJECT_TYPE, id)?;
        }

        self.shadow_map_render_stage = None;
        self.owned_render_stages.remove_all(render_system)
    }
}

/// Adds a shadow caster stage for meshes. Builds on `ForwardPipelinePlugin`, which registers the
/// mesh render object type, and keeps it loaded for as long as this plugin is.
#[derive(Default)]
pub struct ShadowMapPipelinePlugin {
    state: Mutex<ShadowMapPipelineState>,
}

impl ShadowMapPipelinePlugin {
    pub fn shadow_map_render_stage(&self) -> Option<RenderStage> {
        self.state.lock().shadow_map_render_stage.clone()
    }
}

impl PipelinePlugin for ShadowMapPipelinePlugin {
    fn plugin_name(&self) -> &'static str {
        "ShadowMapPipelinePlugin"
    }

    fn load(
        &self,
        context: &mut PipelinePluginContext,
    ) -> StrataResult<()> {
        context.get_plugin::<ForwardPipelinePlugin>()?;

        let mut state = self.state.lock();
        if let Err(e) = state.load(context.render_system_mut()) {
            if let Err(cleanup_error) = state.unload(context.render_system_mut()) {
                log::error!(
                    "Failed to clean up after a failed shadow map pipeline load: {}",
                    cleanup_error
                );
            }
            context.release_plugin::<ForwardPipelinePlugin>()?;
            return Err(e);
        }

        Ok(())
    }

    fn unload(
        &self,
        context: &mut PipelinePluginContext,
    ) -> StrataResult<()> {
        self.state.lock().unload(context.render_system_mut())?;
        context.release_plugin::<ForwardPipelinePlugin>()
    }
}
