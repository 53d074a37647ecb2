use crate::PipelinePluginManager;
use downcast_rs::{impl_downcast, DowncastSync};
use std::sync::Arc;
use strata_api::StrataResult;
use strata_framework::render_stages::{RenderContext, RenderSystem};

/// A renderer feature that registers stages, object types, selectors and processors into the
/// shared `RenderSystem`. Instances are created and owned by the `PipelinePluginManager`; a plugin
/// is loaded once no matter how many requesters ask for it.
///
/// `unload` must undo exactly what `load` registered, including releasing any plugins that
/// `load` requested through the context. Since `load` only gets `&self`, plugins keep what they
/// need to undo in interior-mutable state.
pub trait PipelinePlugin: DowncastSync {
    fn plugin_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn load(
        &self,
        context: &mut PipelinePluginContext,
    ) -> StrataResult<()>;

    fn unload(
        &self,
        _context: &mut PipelinePluginContext,
    ) -> StrataResult<()> {
        Ok(())
    }
}

impl_downcast!(sync PipelinePlugin);

/// Handed to `load`/`unload` for the duration of the call only
pub struct PipelinePluginContext<'a> {
    render_context: &'a RenderContext,
    render_system: &'a mut RenderSystem,
    plugin_manager: &'a mut PipelinePluginManager,
}

impl<'a> PipelinePluginContext<'a> {
    pub(crate) fn new(
        render_context: &'a RenderContext,
        render_system: &'a mut RenderSystem,
        plugin_manager: &'a mut PipelinePluginManager,
    ) -> Self {
        PipelinePluginContext {
            render_context,
            render_system,
            plugin_manager,
        }
    }

    pub fn render_context(&self) -> &RenderContext {
        self.render_context
    }

    pub fn render_system(&self) -> &RenderSystem {
        self.render_system
    }

    pub fn render_system_mut(&mut self) -> &mut RenderSystem {
        self.render_system
    }

    /// Requests a plugin this plugin depends on. Pair with `release_plugin` in `unload`.
    pub fn get_plugin<T: PipelinePlugin + Default>(&mut self) -> StrataResult<Arc<T>> {
        self.plugin_manager
            .get_plugin::<T>(self.render_context, self.render_system)
    }

    pub fn release_plugin<T: PipelinePlugin>(&mut self) -> StrataResult<()> {
        self.plugin_manager
            .release_plugin::<T>(self.render_context, self.render_system)
    }
}
