use super::{
    RenderGroupMask, RenderStage, RenderStageFilter, RenderStageMask, RenderStageMaskBuilder,
};
use glam::Vec3;
use std::sync::Arc;

pub type RenderViewIndex = u32;
pub type RenderViewCount = u32;

/// A stage drawn by a view, optionally with a filter that only applies to this view/stage pair.
#[derive(Clone)]
pub struct RenderViewStage {
    render_stage: RenderStage,
    filter: Option<Arc<dyn RenderStageFilter>>,
}

impl RenderViewStage {
    pub fn new(render_stage: RenderStage) -> Self {
        RenderViewStage {
            render_stage,
            filter: None,
        }
    }

    pub fn with_filter(
        mut self,
        filter: Arc<dyn RenderStageFilter>,
    ) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn render_stage(&self) -> &RenderStage {
        &self.render_stage
    }

    pub fn filter(&self) -> Option<&Arc<dyn RenderStageFilter>> {
        self.filter.as_ref()
    }

    pub(crate) fn set_filter(
        &mut self,
        filter: Arc<dyn RenderStageFilter>,
    ) {
        self.filter = Some(filter);
    }
}

impl std::fmt::Debug for RenderViewStage {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("RenderViewStage")
            .field("render_stage", &self.render_stage.name())
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

/// Everything needed to add a view to the frame during `before_extract`
#[derive(Clone, Debug)]
pub struct RenderViewDef {
    pub debug_name: String,
    pub eye_position: Vec3,
    pub view_dir: Vec3,
    pub culling_mask: RenderGroupMask,
    pub render_stages: Vec<RenderViewStage>,
}

impl RenderViewDef {
    pub fn new(debug_name: &str) -> Self {
        RenderViewDef {
            debug_name: debug_name.to_string(),
            eye_position: Vec3::ZERO,
            view_dir: -Vec3::Z,
            culling_mask: RenderGroupMask::ALL,
            render_stages: Vec::default(),
        }
    }

    pub fn with_eye(
        mut self,
        eye_position: Vec3,
        view_dir: Vec3,
    ) -> Self {
        self.eye_position = eye_position;
        self.view_dir = view_dir;
        self
    }

    pub fn with_culling_mask(
        mut self,
        culling_mask: RenderGroupMask,
    ) -> Self {
        self.culling_mask = culling_mask;
        self
    }

    pub fn with_render_stage(
        mut self,
        render_stage: &RenderStage,
    ) -> Self {
        self.render_stages
            .push(RenderViewStage::new(render_stage.clone()));
        self
    }

    pub fn with_view_stage(
        mut self,
        view_stage: RenderViewStage,
    ) -> Self {
        self.render_stages.push(view_stage);
        self
    }
}

struct RenderViewInner {
    eye_position: Vec3,
    view_dir: Vec3,
    view_index: RenderViewIndex,
    culling_mask: RenderGroupMask,
    render_stage_mask: RenderStageMask,
    debug_name: String,
}

/// A camera/viewpoint for one frame. Its per-stage draw lists live in the frame, this only holds
/// the immutable parameters that selection and keying read.
#[derive(Clone)]
pub struct RenderView {
    inner: Arc<RenderViewInner>,
}

impl RenderView {
    pub fn new(
        view_index: RenderViewIndex,
        eye_position: Vec3,
        view_dir: Vec3,
        culling_mask: RenderGroupMask,
        render_stages: &[RenderViewStage],
        debug_name: String,
    ) -> RenderView {
        let render_stage_mask = render_stages
            .iter()
            .fold(RenderStageMaskBuilder::default(), |builder, view_stage| {
                builder.add_render_stage(view_stage.render_stage())
            })
            .build();

        log::trace!("Allocate view {} {}", debug_name, view_index);
        let inner = RenderViewInner {
            eye_position,
            view_dir: view_dir.normalize_or_zero(),
            view_index,
            culling_mask,
            render_stage_mask,
            debug_name,
        };

        RenderView {
            inner: Arc::new(inner),
        }
    }

    pub fn eye_position(&self) -> Vec3 {
        self.inner.eye_position
    }

    pub fn view_dir(&self) -> Vec3 {
        self.inner.view_dir
    }

    pub fn view_index(&self) -> RenderViewIndex {
        self.inner.view_index
    }

    pub fn culling_mask(&self) -> RenderGroupMask {
        self.inner.culling_mask
    }

    pub fn render_stage_mask(&self) -> RenderStageMask {
        self.inner.render_stage_mask
    }

    pub fn debug_name(&self) -> &str {
        &self.inner.debug_name
    }

    /// Signed distance of a point along the view direction. Objects behind the eye are negative.
    #[inline(always)]
    pub fn distance_to(
        &self,
        position: Vec3,
    ) -> f32 {
        (position - self.inner.eye_position).dot(self.inner.view_dir)
    }
}

impl std::fmt::Debug for RenderView {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("RenderView")
            .field("debug_name", &self.inner.debug_name)
            .field("view_index", &self.inner.view_index)
            .finish()
    }
}
