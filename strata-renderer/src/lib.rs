//! Pipeline plugins and the renderer that drives a `RenderSystem` through frames

mod pipeline_plugin;
pub use pipeline_plugin::PipelinePlugin;
pub use pipeline_plugin::PipelinePluginContext;

mod pipeline_plugin_manager;
pub use pipeline_plugin_manager::PipelinePluginManager;

mod default_pipeline_plugins;
pub use default_pipeline_plugins::load_pipeline_plugin;
pub use default_pipeline_plugins::DefaultPipelinePlugins;
pub use default_pipeline_plugins::PipelinePluginLoader;

mod renderer;
pub use renderer::Renderer;

mod renderer_builder;
pub use renderer_builder::RendererBuilder;
