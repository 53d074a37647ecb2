use crate::{
    load_pipeline_plugin, DefaultPipelinePlugins, PipelinePlugin, PipelinePluginLoader, Renderer,
};
use std::sync::Arc;
use strata_api::StrataResult;
use strata_framework::render_stages::{
    RenderObjectType, RenderStageDesc, RenderSystem, RendererPlugin,
};

#[derive(Default)]
pub struct RendererBuilder {
    render_stages: Vec<RenderStageDesc>,
    renderer_plugins: Vec<Arc<dyn RendererPlugin>>,
    default_pipeline_plugins: Vec<(RenderObjectType, PipelinePluginLoader)>,
    pipeline_plugins: Vec<PipelinePluginLoader>,
}

impl RendererBuilder {
    /// Stages registered before any plugin loads. Plugins find them with `stage_by_name`.
    pub fn add_render_stage(
        mut self,
        render_stage: RenderStageDesc,
    ) -> Self {
        self.render_stages.push(render_stage);
        self
    }

    pub fn add_render_stages(
        mut self,
        render_stages: impl IntoIterator<Item = RenderStageDesc>,
    ) -> Self {
        self.render_stages.extend(render_stages);
        self
    }

    pub fn add_renderer_plugin(
        mut self,
        plugin: Arc<dyn RendererPlugin>,
    ) -> Self {
        self.renderer_plugins.push(plugin);
        self
    }

    /// Loaded lazily, the first time an object of `object_type` is ensured on the renderer
    pub fn add_default_pipeline_plugin<T: PipelinePlugin + Default>(
        mut self,
        object_type: RenderObjectType,
    ) -> Self {
        self.default_pipeline_plugins
            .push((object_type, load_pipeline_plugin::<T>));
        self
    }

    /// Loaded when the renderer is built and held until it shuts down
    pub fn add_pipeline_plugin<T: PipelinePlugin + Default>(mut self) -> Self {
        self.pipeline_plugins.push(load_pipeline_plugin::<T>);
        self
    }

    pub fn build(self) -> StrataResult<Renderer> {
        let mut render_system = RenderSystem::default();
        for render_stage in &self.render_stages {
            render_system.add_stage_desc(render_stage)?;
        }

        let mut default_plugins = DefaultPipelinePlugins::default();
        for (object_type, loader) in self.default_pipeline_plugins {
            default_plugins.register_loader(object_type, loader)?;
        }

        // Plugins loaded past this point are unloaded by the renderer even if a later one fails
        let mut renderer = Renderer::new(render_system, default_plugins, self.renderer_plugins);
        for loader in self.pipeline_plugins {
            renderer.load_plugin_with(loader)?;
        }

        Ok(renderer)
    }
}
