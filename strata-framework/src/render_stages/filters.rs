use super::{RenderGroupMask, RenderObject, RenderView, RenderViewStage};

/// Vetoes an object that was selected into a stage for one view. A filter never changes the
/// object or any other view/stage pair.
pub trait RenderStageFilter: Send + Sync {
    fn is_visible(
        &self,
        render_object: &RenderObject,
        render_view: &RenderView,
        render_view_stage: &RenderViewStage,
    ) -> bool;
}

impl<F> RenderStageFilter for F
where
    F: Fn(&RenderObject, &RenderView, &RenderViewStage) -> bool + Send + Sync,
{
    fn is_visible(
        &self,
        render_object: &RenderObject,
        render_view: &RenderView,
        render_view_stage: &RenderViewStage,
    ) -> bool {
        (self)(render_object, render_view, render_view_stage)
    }
}

/// Only lets through objects in the given render groups
pub struct RenderGroupFilter {
    pub render_group: RenderGroupMask,
}

impl RenderGroupFilter {
    pub fn new(render_group: RenderGroupMask) -> Self {
        RenderGroupFilter { render_group }
    }
}

impl RenderStageFilter for RenderGroupFilter {
    fn is_visible(
        &self,
        render_object: &RenderObject,
        _render_view: &RenderView,
        _render_view_stage: &RenderViewStage,
    ) -> bool {
        self.render_group.contains_group(render_object.render_group)
    }
}

/// Drops objects further than `max_distance` along the view direction
pub struct MaxDistanceFilter {
    pub max_distance: f32,
}

impl RenderStageFilter for MaxDistanceFilter {
    fn is_visible(
        &self,
        render_object: &RenderObject,
        render_view: &RenderView,
        _render_view_stage: &RenderViewStage,
    ) -> bool {
        render_view.distance_to(render_object.position) <= self.max_distance
    }
}
