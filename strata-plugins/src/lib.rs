//! Stock pipeline plugins: forward opaque/transparent mesh drawing, mesh shadow casters, and a
//! renderer plugin that adds the camera view.

mod stages;
pub use stages::default_render_stages;
pub use stages::MESH_RENDER_OBJECT_TYPE;
pub use stages::OPAQUE_RENDER_STAGE_NAME;
pub use stages::SHADOW_MAP_RENDER_STAGE_NAME;
pub use stages::TRANSPARENT_RENDER_STAGE_NAME;

mod forward_pipeline_plugin;
pub use forward_pipeline_plugin::ForwardPipelinePlugin;
pub use forward_pipeline_plugin::MESH_EFFECT_NAME;
pub use forward_pipeline_plugin::MESH_TRANSPARENT_EFFECT_NAME;

mod shadow_map_pipeline_plugin;
pub use shadow_map_pipeline_plugin::ShadowMapPipelinePlugin;
pub use shadow_map_pipeline_plugin::MESH_SHADOW_EFFECT_NAME;

mod main_view_renderer_plugin;
pub use main_view_renderer_plugin::MainViewCamera;
pub use main_view_renderer_plugin::MainViewRendererPlugin;
