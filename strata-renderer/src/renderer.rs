use crate::{DefaultPipelinePlugins, PipelinePlugin, PipelinePluginManager};
use std::sync::Arc;
use strata_api::{StrataError, StrataResult};
use strata_framework::render_stages::render_stages_prelude::*;

/// Drives a `RenderSystem` through frames and owns the plugins that configure it
pub struct Renderer {
    render_system: RenderSystem,
    plugin_manager: PipelinePluginManager,
    default_plugins: DefaultPipelinePlugins,
    renderer_plugins: Vec<Arc<dyn RendererPlugin>>,
    render_context: RenderContext,
    next_frame_index: u64,
    is_shut_down: bool,
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Error while shutting down the renderer: {}", e);
        }
    }
}

impl Renderer {
    pub fn new(
        render_system: RenderSystem,
        default_plugins: DefaultPipelinePlugins,
        renderer_plugins: Vec<Arc<dyn RendererPlugin>>,
    ) -> Self {
        Renderer {
            render_system,
            plugin_manager: PipelinePluginManager::default(),
            default_plugins,
            renderer_plugins,
            render_context: RenderContext::default(),
            next_frame_index: 0,
            is_shut_down: false,
        }
    }

    pub fn render_system(&self) -> &RenderSystem {
        &self.render_system
    }

    pub fn render_system_mut(&mut self) -> &mut RenderSystem {
        &mut self.render_system
    }

    pub fn plugin_manager(&self) -> &PipelinePluginManager {
        &self.plugin_manager
    }

    /// Context of the frame in flight (or of the last frame)
    pub fn render_context(&self) -> RenderContext {
        self.render_context
    }

    pub fn add_renderer_plugin(
        &mut self,
        plugin: Arc<dyn RendererPlugin>,
    ) {
        log::debug!("Add renderer plugin {}", plugin.plugin_name());
        self.renderer_plugins.push(plugin);
    }

    pub fn get_plugin<T: PipelinePlugin + Default>(&mut self) -> StrataResult<Arc<T>> {
        self.plugin_manager
            .get_plugin::<T>(&self.render_context, &mut self.render_system)
    }

    pub fn release_plugin<T: PipelinePlugin>(&mut self) -> StrataResult<()> {
        self.plugin_manager
            .release_plugin::<T>(&self.render_context, &mut self.render_system)
    }

    pub(crate) fn load_plugin_with(
        &mut self,
        loader: crate::PipelinePluginLoader,
    ) -> StrataResult<()> {
        (loader)(
            &mut self.plugin_manager,
            &self.render_context,
            &mut self.render_system,
        )
    }

    /// Makes sure objects of this type can be collected, loading its default pipeline plugin if
    /// the type is not registered yet
    pub fn ensure_render_object_type(
        &mut self,
        object_type: RenderObjectType,
    ) -> StrataResult<()> {
        if self
            .render_system
            .is_render_object_type_registered(object_type)
        {
            return Ok(());
        }

        self.default_plugins.ensure_loaded(
            object_type,
            &mut self.plugin_manager,
            &self.render_context,
            &mut self.render_system,
        )?;

        if self
            .render_system
            .is_render_object_type_registered(object_type)
        {
            Ok(())
        } else {
            Err(StrataError::UnknownRenderObjectType(object_type.name()))
        }
    }

    /// Starts a new frame and returns its context
    pub fn before_extract(&mut self) -> StrataResult<RenderContext> {
        self.render_context = RenderContext::new(self.next_frame_index);
        self.next_frame_index += 1;

        self.render_system
            .before_extract(&self.render_context, &self.renderer_plugins)?;
        Ok(self.render_context)
    }

    pub fn collect(
        &mut self,
        collectors: &[&dyn RenderCollector],
    ) -> StrataResult<()> {
        self.render_system.collect(&self.render_context, collectors)
    }

    pub fn sort(&mut self) -> StrataResult<()> {
        self.render_system.sort()
    }

    /// Runs `before_extract`, `collect` and `sort` for one frame. Afterwards the draw lists can be
    /// read with `draw_list`.
    #[profiling::function]
    pub fn render_frame(
        &mut self,
        collectors: &[&dyn RenderCollector],
    ) -> StrataResult<RenderContext> {
        let render_context = self.before_extract()?;
        self.collect(collectors)?;
        self.sort()?;
        log::trace!("Frame {} is ready", render_context.frame_index());
        Ok(render_context)
    }

    pub fn draw_list(
        &self,
        view_index: RenderViewIndex,
        render_stage: &RenderStage,
    ) -> StrataResult<&[RenderNode]> {
        self.render_system.draw_list(view_index, render_stage)
    }

    /// Drops the frame in flight and unloads every pipeline plugin. Called on drop if not called
    /// explicitly.
    pub fn shutdown(&mut self) -> StrataResult<()> {
        if self.is_shut_down {
            return Ok(());
        }

        log::debug!("Shutting down renderer");
        self.is_shut_down = true;
        self.render_system.abandon_frame();
        self.plugin_manager
            .release_all(&self.render_context, &mut self.render_system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PipelinePluginContext, RendererBuilder};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SPRITE: RenderObjectType = RenderObjectType::new("Sprite");

    static SPRITE_UNLOADS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct SpritePipelinePlugin;

    impl PipelinePlugin for SpritePipelinePlugin {
        fn load(
            &self,
            context: &mut PipelinePluginContext,
        ) -> StrataResult<()> {
            context
                .render_system_mut()
                .register_render_object_type(SPRITE)?;
            Ok(())
        }

        fn unload(
            &self,
            context: &mut PipelinePluginContext,
        ) -> StrataResult<()> {
            SPRITE_UNLOADS.fetch_add(1, Ordering::SeqCst);
            context
                .render_system_mut()
                .unregister_render_object_type(SPRITE)
        }
    }

    #[derive(Default)]
    struct BrokenPipelinePlugin;

    impl PipelinePlugin for BrokenPipelinePlugin {
        fn load(
            &self,
            _context: &mut PipelinePluginContext,
        ) -> StrataResult<()> {
            Err("missing shader".into())
        }
    }

    struct FailingViews;

    impl RendererPlugin for FailingViews {
        fn before_extract(
            &self,
            context: &mut BeforeExtractContext,
        ) -> StrataResult<()> {
            let unknown = RenderSystem::default().add_stage("Elsewhere", SortMode::None)?;
            context.add_view(RenderViewDef::new("main").with_render_stage(&unknown))?;
            Ok(())
        }
    }

    #[test]
    fn frames_are_numbered_and_plugins_unload_on_drop() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut renderer = RendererBuilder::default()
            .add_render_stage(RenderStageDesc::new("Opaque", SortMode::FrontToBack))
            .add_default_pipeline_plugin::<SpritePipelinePlugin>(SPRITE)
            .build()
            .unwrap();
        assert!(renderer.render_system().stage_by_name("Opaque").is_some());

        renderer.ensure_render_object_type(SPRITE).unwrap();
        assert!(renderer.plugin_manager().is_loaded::<SpritePipelinePlugin>());

        for expected in 0..3 {
            let render_context = renderer.render_frame(&[]).unwrap();
            assert_eq!(render_context.frame_index(), expected);
            assert_eq!(renderer.render_system().frame_phase(), FramePhase::Sorted);
        }

        let unloads_before = SPRITE_UNLOADS.load(Ordering::SeqCst);
        drop(renderer);
        assert_eq!(SPRITE_UNLOADS.load(Ordering::SeqCst), unloads_before + 1);
    }

    #[test]
    fn failed_plugin_load_fails_the_build() {
        let result = RendererBuilder::default()
            .add_pipeline_plugin::<BrokenPipelinePlugin>()
            .build();
        assert_eq!(
            result.err(),
            Some(StrataError::StringError("missing shader".to_string()))
        );
    }

    #[test]
    fn failed_before_extract_abandons_the_frame() {
        let mut renderer = RendererBuilder::default()
            .add_renderer_plugin(Arc::new(FailingViews))
            .build()
            .unwrap();

        assert!(matches!(
            renderer.render_frame(&[]),
            Err(StrataError::UnknownRenderStage(_))
        ));
        assert_eq!(renderer.render_system().frame_phase(), FramePhase::Idle);
        assert_eq!(
            renderer.sort(),
            Err(StrataError::FrameOutOfOrder {
                requested: "sort",
                current: "idle"
            })
        );
    }
}
