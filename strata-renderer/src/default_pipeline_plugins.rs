use crate::{PipelinePlugin, PipelinePluginManager};
use fnv::{FnvHashMap, FnvHashSet};
use strata_api::{StrataError, StrataResult};
use strata_framework::render_stages::{RenderContext, RenderObjectType, RenderSystem};

pub type PipelinePluginLoader =
    fn(&mut PipelinePluginManager, &RenderContext, &mut RenderSystem) -> StrataResult<()>;

/// Requests `T` from the manager and keeps the reference. Used as a `PipelinePluginLoader`.
pub fn load_pipeline_plugin<T: PipelinePlugin + Default>(
    plugin_manager: &mut PipelinePluginManager,
    render_context: &RenderContext,
    render_system: &mut RenderSystem,
) -> StrataResult<()> {
    plugin_manager
        .get_plugin::<T>(render_context, render_system)
        .map(|_| ())
}

/// Maps a render object type to the plugin that knows how to draw it. The plugin is requested the
/// first time an object of that type shows up, and never more than once per type.
#[derive(Default)]
pub struct DefaultPipelinePlugins {
    loaders: FnvHashMap<RenderObjectType, PipelinePluginLoader>,
    instantiated: FnvHashSet<RenderObjectType>,
}

impl DefaultPipelinePlugins {
    pub fn register<T: PipelinePlugin + Default>(
        &mut self,
        object_type: RenderObjectType,
    ) -> StrataResult<()> {
        self.register_loader(object_type, load_pipeline_plugin::<T>)
    }

    pub fn register_loader(
        &mut self,
        object_type: RenderObjectType,
        loader: PipelinePluginLoader,
    ) -> StrataResult<()> {
        if self.loaders.contains_key(&object_type) {
            return Err(StrataError::DuplicateRenderObjectType(object_type.name()));
        }

        log::debug!(
            "Register default pipeline plugin for render object type {}",
            object_type.name()
        );
        self.loaders.insert(object_type, loader);
        Ok(())
    }

    pub fn has_default(
        &self,
        object_type: RenderObjectType,
    ) -> bool {
        self.loaders.contains_key(&object_type)
    }

    pub fn is_instantiated(
        &self,
        object_type: RenderObjectType,
    ) -> bool {
        self.instantiated.contains(&object_type)
    }

    /// Returns `true` if the default plugin was loaded by this call
    pub fn ensure_loaded(
        &mut self,
        object_type: RenderObjectType,
        plugin_manager: &mut PipelinePluginManager,
        render_context: &RenderContext,
        render_system: &mut RenderSystem,
    ) -> StrataResult<bool> {
        if self.instantiated.contains(&object_type) {
            return Ok(false);
        }

        let loader = self
            .loaders
            .get(&object_type)
            .ok_or(StrataError::UnknownRenderObjectType(object_type.name()))?;

        log::debug!(
            "Load default pipeline plugin for render object type {}",
            object_type.name()
        );
        (loader)(plugin_manager, render_context, render_system)?;
        self.instantiated.insert(object_type);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PipelinePluginContext;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SPRITE: RenderObjectType = RenderObjectType::new("Sprite");
    const TEXT: RenderObjectType = RenderObjectType::new("Text");

    static SPRITE_LOADS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct SpritePlugin;

    impl PipelinePlugin for SpritePlugin {
        fn load(
            &self,
            context: &mut PipelinePluginContext,
        ) -> StrataResult<()> {
            SPRITE_LOADS.fetch_add(1, Ordering::SeqCst);
            context
                .render_system_mut()
                .register_render_object_type(SPRITE)?;
            Ok(())
        }
    }

    #[test]
    fn default_plugin_is_instantiated_once() {
        let render_context = RenderContext::default();
        let mut render_system = RenderSystem::default();
        let mut plugin_manager = PipelinePluginManager::default();

        let mut defaults = DefaultPipelinePlugins::default();
        defaults.register::<SpritePlugin>(SPRITE).unwrap();
        assert!(defaults.register::<SpritePlugin>(SPRITE).is_err());
        assert!(defaults.has_default(SPRITE));

        let loaded = defaults
            .ensure_loaded(
                SPRITE,
                &mut plugin_manager,
                &render_context,
                &mut render_system,
            )
            .unwrap();
        assert!(loaded);

        let loaded = defaults
            .ensure_loaded(
                SPRITE,
                &mut plugin_manager,
                &render_context,
                &mut render_system,
            )
            .unwrap();
        assert!(!loaded);
        assert_eq!(SPRITE_LOADS.load(Ordering::SeqCst), 1);
        assert!(render_system.is_render_object_type_registered(SPRITE));
        assert_eq!(plugin_manager.reference_count::<SpritePlugin>(), 1);

        assert_eq!(
            defaults.ensure_loaded(
                TEXT,
                &mut plugin_manager,
                &render_context,
                &mut render_system
            ),
            Err(StrataError::UnknownRenderObjectType("Text"))
        );
    }
}
