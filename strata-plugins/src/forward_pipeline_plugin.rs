use crate::stages::OwnedRenderStages;
use crate::{
    MESH_RENDER_OBJECT_TYPE, OPAQUE_RENDER_STAGE_NAME, TRANSPARENT_RENDER_STAGE_NAME,
};
use parking_lot::Mutex;
use std::sync::Arc;
use strata_api::StrataResult;
use strata_framework::render_stages::{
    PipelineProcessorId, RenderGroupMask, RenderStage, RenderStageSelectorId, RenderSystem,
    SortMode, TransparentBlendPipelineProcessor, TransparentRenderStageSelector,
};
use strata_renderer::{PipelinePlugin, PipelinePluginContext};

pub const MESH_EFFECT_NAME: &str = "Mesh";
pub const MESH_TRANSPARENT_EFFECT_NAME: &str = "MeshTransparent";

#[derive(Default)]
struct ForwardPipelineState {
    owned_render_stages: OwnedRenderStages,
    opaque_render_stage: Option<RenderStage>,
    transparent_render_stage: Option<RenderStage>,
    registered_mesh_type: bool,
    selector: Option<RenderStageSelectorId>,
    pipeline_processor: Option<PipelineProcessorId>,
}

impl ForwardPipelineState {
    fn load(
        &mut self,
        render_system: &mut RenderSystem,
    ) -> StrataResult<()> {
        let opaque_render_stage = self.owned_render_stages.find_or_add(
            render_system,
            OPAQUE_RENDER_STAGE_NAME,
            SortMode::StateChange,
        )?;
        self.opaque_render_stage = Some(opaque_render_stage.clone());

        let transparent_render_stage = self.owned_render_stages.find_or_add(
            render_system,
            TRANSPARENT_RENDER_STAGE_NAME,
            SortMode::BackToFront,
        )?;
        self.transparent_render_stage = Some(transparent_render_stage.clone());

        render_system.register_render_object_type(MESH_RENDER_OBJECT_TYPE)?;
        self.registered_mesh_type = true;

        let selector = TransparentRenderStageSelector::new(
            RenderGroupMask::ALL,
            Some(opaque_render_stage),
            Some(transparent_render_stage.clone()),
            MESH_EFFECT_NAME,
        )
        .with_transparent_effect_name(MESH_TRANSPARENT_EFFECT_NAME);
        self.selector = Some(
            render_system.add_render_stage_selector(MESH_RENDER_OBJECT_TYPE, Arc::new(selector))?,
        );

        let pipeline_processor = TransparentBlendPipelineProcessor {
            transparent_render_stage,
        };
        self.pipeline_processor = Some(
            render_system
                .add_pipeline_processor(MESH_RENDER_OBJECT_TYPE, Arc::new(pipeline_processor))?,
        );

        Ok(())
    }

    // Undoes whatever part of load() completed, newest first
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

        if std::mem::take(&mut self.registered_mesh_type) {
            render_system.unregister_render_object_type(MESH_RENDER_OBJECT_TYPE)?;
        }

        self.opaque_render_stage = None;
        self.transparent_render_stage = None;
        self.owned_render_stages.remove_all(render_system)
    }
}

/// Draws meshes in an opaque stage sorted for fewer state changes and a transparent stage sorted
/// back to front with alpha blending.
#[derive(Default)]
pub struct ForwardPipelinePlugin {
    state: Mutex<ForwardPipelineState>,
}

impl ForwardPipelinePlugin {
    pub fn opaque_render_stage(&self) -> Option<RenderStage> {
        self.state.lock().opaque_render_stage.clone()
    }

    pub fn transparent_render_stage(&self) -> Option<RenderStage> {
        self.state.lock().transparent_render_stage.clone()
    }
}

impl PipelinePlugin for ForwardPipelinePlugin {
    fn plugin_name(&self) -> &'static str {
        "ForwardPipelinePlugin"
    }

    fn load(
        &self,
        context: &mut PipelinePluginContext,
    ) -> StrataResult<()> {
        let mut state = self.state.lock();
        let render_system = context.render_system_mut();
        if let Err(e) = state.load(render_system) {
            if let Err(cleanup_error) = state.unload(render_system) {
                log::error!(
                    "Failed to clean up after a failed forward pipeline load: {}",
                    cleanup_error
                );
            }
            return Err(e);
        }

        Ok(())
    }

    fn unload(
        &self,
        context: &mut PipelinePluginContext,
    ) -> StrataResult<()> {
        self.state.lock().unload(context.render_system_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_api::StrataError;
    use strata_framework::render_stages::RenderContext;
    use strata_renderer::PipelinePluginManager;

    #[test]
    fn load_registers_and_unload_removes() {
        let _ = env_logger::builder().is_test(true).try_init();
        let render_context = RenderContext::default();
        let mut render_system = RenderSystem::default();
        let mut manager = PipelinePluginManager::default();

        let plugin = manager
            .get_plugin::<ForwardPipelinePlugin>(&render_context, &mut render_system)
            .unwrap();

        let opaque = plugin.opaque_render_stage().unwrap();
        let transparent = plugin.transparent_render_stage().unwrap();
        assert_eq!(opaque.sort_mode(), SortMode::StateChange);
        assert_eq!(transparent.sort_mode(), SortMode::BackToFront);

        let mesh_type = render_system
            .render_object_type_entry(MESH_RENDER_OBJECT_TYPE)
            .unwrap();
        assert_eq!(mesh_type.selector_count(), 1);
        assert_eq!(mesh_type.pipeline_processor_count(), 1);
        assert_eq!(
            render_system
                .active_render_stage(MESH_RENDER_OBJECT_TYPE, &transparent)
                .and_then(|active| active.effect_selector.as_ref())
                .map(|effect| effect.effect_name()),
            Some(MESH_TRANSPARENT_EFFECT_NAME)
        );

        manager
            .release_plugin::<ForwardPipelinePlugin>(&render_context, &mut render_system)
            .unwrap();
        assert!(!render_system.is_render_object_type_registered(MESH_RENDER_OBJECT_TYPE));
        assert!(render_system.stage_by_name(OPAQUE_RENDER_STAGE_NAME).is_none());
        assert!(render_system
            .stage_by_name(TRANSPARENT_RENDER_STAGE_NAME)
            .is_none());
    }

    #[test]
    fn preregistered_stages_are_shared() {
        let render_context = RenderContext::default();
        let mut render_system = RenderSystem::default();
        let opaque = render_system
            .add_stage(OPAQUE_RENDER_STAGE_NAME, SortMode::StateChange)
            .unwrap();
        let mut manager = PipelinePluginManager::default();

        let plugin = manager
            .get_plugin::<ForwardPipelinePlugin>(&render_context, &mut render_system)
            .unwrap();
        assert_eq!(plugin.opaque_render_stage(), Some(opaque.clone()));

        manager
            .release_plugin::<ForwardPipelinePlugin>(&render_context, &mut render_system)
            .unwrap();
        assert_eq!(
            render_system.stage_by_name(OPAQUE_RENDER_STAGE_NAME),
            Some(&opaque)
        );
        assert!(render_system
            .stage_by_name(TRANSPARENT_RENDER_STAGE_NAME)
            .is_none());
    }

    #[test]
    fn failed_load_leaves_nothing_behind() {
        let render_context = RenderContext::default();
        let mut render_system = RenderSystem::default();
        render_system
            .register_render_object_type(MESH_RENDER_OBJECT_TYPE)
            .unwrap();
        let mut manager = PipelinePluginManager::default();

        let result =
            manager.get_plugin::<ForwardPipelinePlugin>(&render_context, &mut render_system);
        assert_eq!(
            result.err(),
            Some(StrataError::DuplicateRenderObjectType("Mesh"))
        );
        assert!(!manager.is_loaded::<ForwardPipelinePlugin>());
        assert!(render_system.stage_by_name(OPAQUE_RENDER_STAGE_NAME).is_none());
        assert!(render_system.is_render_object_type_registered(MESH_RENDER_OBJECT_TYPE));
    }
}
