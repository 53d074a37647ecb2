use strata_api::StrataResult;
use strata_framework::render_stages::{
    RenderObjectType, RenderStage, RenderStageDesc, RenderSystem, SortMode,
};

pub const OPAQUE_RENDER_STAGE_NAME: &str = "Opaque";
pub const TRANSPARENT_RENDER_STAGE_NAME: &str = "Transparent";
pub const SHADOW_MAP_RENDER_STAGE_NAME: &str = "ShadowMapCaster";

pub const MESH_RENDER_OBJECT_TYPE: RenderObjectType = RenderObjectType::new("Mesh");

/// Stage descriptors matching what the stock plugins would register themselves, for passing to
/// `RendererBuilder::add_render_stages` so the stages outlive the plugins.
pub fn default_render_stages() -> Vec<RenderStageDesc> {
    vec![
        RenderStageDesc::new(OPAQUE_RENDER_STAGE_NAME, SortMode::StateChange),
        RenderStageDesc::new(TRANSPARENT_RENDER_STAGE_NAME, SortMode::BackToFront),
        RenderStageDesc::new(SHADOW_MAP_RENDER_STAGE_NAME, SortMode::FrontToBack),
    ]
}

/// Stages a plugin registered itself, removed again when the plugin unloads. Stages that were
/// already registered are shared and left alone.
#[derive(Default)]
pub(crate) struct OwnedRenderStages {
    render_stages: Vec<RenderStage>,
}

impl OwnedRenderStages {
    pub(crate) fn find_or_add(
        &mut self,
        render_system: &mut RenderSystem,
        name: &str,
        sort_mode: SortMode,
    ) -> StrataResult<RenderStage> {
        if let Some(render_stage) = render_system.stage_by_name(name) {
            if render_stage.sort_mode() != sort_mode {
                log::warn!(
                    "Render stage {} is already registered with sort mode {:?}, expected {:?}",
                    name,
                    render_stage.sort_mode(),
                    sort_mode
                );
            }
            return Ok(render_stage.clone());
        }

        let render_stage = render_system.add_stage(name, sort_mode)?;
        self.render_stages.push(render_stage.clone());
        Ok(render_stage)
    }

    pub(crate) fn remove_all(
        &mut self,
        render_system: &mut RenderSystem,
    ) -> StrataResult<()> {
        while let Some(render_stage) = self.render_stages.pop() {
            render_system.remove_stage(&render_stage)?;
        }

        Ok(())
    }
}
