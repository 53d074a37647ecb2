use crate::{PipelinePlugin, PipelinePluginContext};
use fnv::FnvHashMap;
use std::any::TypeId;
use std::sync::Arc;
use strata_api::{StrataError, StrataResult};
use strata_framework::render_stages::{RenderContext, RenderSystem};

struct LoadedPipelinePlugin {
    plugin: Arc<dyn PipelinePlugin>,
    name: &'static str,
    reference_count: usize,
}

/// Owns at most one instance per plugin type, along with a count of outstanding requests.
/// Loading happens on the first `get_plugin`, unloading on the matching last `release_plugin`.
///
/// Loading and unloading must not overlap with frame execution. Every method takes `&mut self`
/// and the `RenderSystem` mutably, so this is enforced by the caller holding both.
#[derive(Default)]
pub struct PipelinePluginManager {
    plugins: FnvHashMap<TypeId, LoadedPipelinePlugin>,
    load_order: Vec<TypeId>,
    // Plugins whose load() is on the stack, used to detect dependency cycles
    loading: Vec<(TypeId, &'static str)>,
}

impl PipelinePluginManager {
    pub fn get_plugin<T: PipelinePlugin + Default>(
        &mut self,
        render_context: &RenderContext,
        render_system: &mut RenderSystem,
    ) -> StrataResult<Arc<T>> {
        let type_id = TypeId::of::<T>();
        if let Some(loaded) = self.plugins.get_mut(&type_id) {
            loaded.reference_count += 1;
            log::trace!(
                "Pipeline plugin {} requested again, {} references",
                loaded.name,
                loaded.reference_count
            );
            return loaded
                .plugin
                .clone()
                .downcast_arc::<T>()
                .map_err(|_| StrataError::from("pipeline plugin stored under the wrong type"));
        }

        if let Some(position) = self.loading.iter().position(|(id, _)| *id == type_id) {
            let mut chain: Vec<_> = self.loading[position..]
                .iter()
                .map(|(_, name)| *name)
                .collect();
            chain.push(self.loading[position].1);
            log::error!("Pipeline plugin cycle: {}", chain.join(" -> "));
            return Err(StrataError::PluginCycle(chain));
        }

        let plugin = Arc::new(T::default());
        let name = plugin.plugin_name();
        log::debug!("Load pipeline plugin {}", name);

        self.loading.push((type_id, name));
        let result = {
            let mut context = PipelinePluginContext::new(render_context, render_system, self);
            plugin.load(&mut context)
        };
        self.loading.pop();

        if let Err(e) = result {
            log::error!("Pipeline plugin {} failed to load: {}", name, e);
            return Err(e);
        }

        self.plugins.insert(
            type_id,
            LoadedPipelinePlugin {
                plugin: plugin.clone(),
                name,
                reference_count: 1,
            },
        );
        self.load_order.push(type_id);
        Ok(plugin)
    }

    pub fn release_plugin<T: PipelinePlugin>(
        &mut self,
        render_context: &RenderContext,
        render_system: &mut RenderSystem,
    ) -> StrataResult<()> {
        let type_id = TypeId::of::<T>();
        let loaded = self
            .plugins
            .get_mut(&type_id)
            .ok_or_else(|| StrataError::PluginNotLoaded(std::any::type_name::<T>()))?;

        loaded.reference_count -= 1;
        if loaded.reference_count > 0 {
            log::trace!(
                "Pipeline plugin {} released, {} references remain",
                loaded.name,
                loaded.reference_count
            );
            return Ok(());
        }

        let loaded = match self.plugins.remove(&type_id) {
            Some(loaded) => loaded,
            None => return Ok(()),
        };
        self.load_order.retain(|id| *id != type_id);
        self.unload(loaded, render_context, render_system)
    }

    /// Unloads every plugin still loaded, most recently loaded first, regardless of outstanding
    /// references. All plugins are unloaded even if some fail; the first error is returned.
    pub fn release_all(
        &mut self,
        render_context: &RenderContext,
        render_system: &mut RenderSystem,
    ) -> StrataResult<()> {
        let mut first_error = None;
        while let Some(type_id) = self.load_order.pop() {
            let loaded = match self.plugins.remove(&type_id) {
                Some(loaded) => loaded,
                None => continue,
            };

            if loaded.reference_count > 1 {
                log::debug!(
                    "Pipeline plugin {} still has {} references at shutdown",
                    loaded.name,
                    loaded.reference_count
                );
            }

            if let Err(e) = self.unload(loaded, render_context, render_system) {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn unload(
        &mut self,
        loaded: LoadedPipelinePlugin,
        render_context: &RenderContext,
        render_system: &mut RenderSystem,
    ) -> StrataResult<()> {
        log::debug!("Unload pipeline plugin {}", loaded.name);
        let mut context = PipelinePluginContext::new(render_context, render_system, self);
        let result = loaded.plugin.unload(&mut context);
        if let Err(e) = &result {
            log::error!("Pipeline plugin {} failed to unload: {}", loaded.name, e);
        }

        result
    }

    pub fn is_loaded<T: PipelinePlugin>(&self) -> bool {
        self.plugins.contains_key(&TypeId::of::<T>())
    }

    pub fn reference_count<T: PipelinePlugin>(&self) -> usize {
        self.plugins
            .get(&TypeId::of::<T>())
            .map(|loaded| loaded.reference_count)
            .unwrap_or(0)
    }

    /// Names of the loaded plugins, in the order they finished loading
    pub fn loaded_plugin_names(&self) -> Vec<&'static str> {
        self.load_order
            .iter()
            .filter_map(|type_id| self.plugins.get(type_id))
            .map(|loaded| loaded.name)
            .collect()
    }
}
