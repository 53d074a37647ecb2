use crate::{OPAQUE_RENDER_STAGE_NAME, TRANSPARENT_RENDER_STAGE_NAME};
use glam::Vec3;
use parking_lot::RwLock;
use std::sync::Arc;
use strata_api::StrataResult;
use strata_framework::render_stages::{
    BeforeExtractContext, MaxDistanceFilter, RenderGroupMask, RenderViewDef, RendererPlugin,
};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MainViewCamera {
    pub eye_position: Vec3,
    pub view_dir: Vec3,
}

impl Default for MainViewCamera {
    fn default() -> Self {
        MainViewCamera {
            eye_position: Vec3::ZERO,
            view_dir: -Vec3::Z,
        }
    }
}

/// Adds the camera view every frame. The view draws every listed stage that is registered at the
/// time; stages that are missing (i.e. their plugin is not loaded) are skipped.
pub struct MainViewRendererPlugin {
    camera: RwLock<MainViewCamera>,
    render_stage_names: Vec<String>,
    culling_mask: RenderGroupMask,
    max_distance: Option<f32>,
}

impl Default for MainViewRendererPlugin {
    fn default() -> Self {
        MainViewRendererPlugin::new(&[OPAQUE_RENDER_STAGE_NAME, TRANSPARENT_RENDER_STAGE_NAME])
    }
}

impl MainViewRendererPlugin {
    pub fn new(render_stage_names: &[&str]) -> Self {
        MainViewRendererPlugin {
            camera: RwLock::new(MainViewCamera::default()),
            render_stage_names: render_stage_names.iter().map(|x| x.to_string()).collect(),
            culling_mask: RenderGroupMask::ALL,
            max_distance: None,
        }
    }

    pub fn with_culling_mask(
        mut self,
        culling_mask: RenderGroupMask,
    ) -> Self {
        self.culling_mask = culling_mask;
        self
    }

    /// Objects further away than this along the view direction are dropped from every stage of
    /// the view
    pub fn with_max_distance(
        mut self,
        max_distance: f32,
    ) -> Self {
        self.max_distance = Some(max_distance);
        self
    }

    pub fn camera(&self) -> MainViewCamera {
        *self.camera.read()
    }

    /// Takes effect on the next `before_extract`
    pub fn set_camera(
        &self,
        camera: MainViewCamera,
    ) {
        *self.camera.write() = camera;
    }
}

impl RendererPlugin for MainViewRendererPlugin {
    fn plugin_name(&self) -> &'static str {
        "MainViewRendererPlugin"
    }

    fn before_extract(
        &self,
        context: &mut BeforeExtractContext,
    ) -> StrataResult<()> {
        let camera = self.camera();
        let mut view_def = RenderViewDef::new("main")
            .with_eye(camera.eye_position, camera.view_dir)
            .with_culling_mask(self.culling_mask);

        let mut render_stages = Vec::with_capacity(self.render_stage_names.len());
        for name in &self.render_stage_names {
            match context.render_system().stage_by_name(name) {
                Some(render_stage) => {
                    view_def = view_def.with_render_stage(render_stage);
                    render_stages.push(render_stage.clone());
                }
                None => log::trace!("Main view skips unregistered render stage {}", name),
            }
        }

        let view_index = context.add_view(view_def)?;
        if let Some(max_distance) = self.max_distance {
            let filter = Arc::new(MaxDistanceFilter { max_distance });
            for render_stage in &render_stages {
                context.add_view_stage_filter(view_index, render_stage, filter.clone())?;
            }
        }

        Ok(())
    }
}
