use super::{
    ActiveRenderStage, RenderNode, RenderObject, RenderStage, RenderStageFilter,
    RenderStageSelector, RenderSystem, RenderView, RenderViewDef, RenderViewIndex,
    RenderViewStage, ViewStageRenderNodes,
};
use std::sync::Arc;
use strata_api::{StrataError, StrataResult};

/// Where the current frame is in the `before_extract` -> `collect` -> `sort` sequence
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    Extracted,
    Collected,
    Sorted,
}

impl Default for FramePhase {
    fn default() -> Self {
        FramePhase::Idle
    }
}

impl FramePhase {
    pub fn name(&self) -> &'static str {
        match self {
            FramePhase::Idle => "idle",
            FramePhase::Extracted => "extracted",
            FramePhase::Collected => "collected",
            FramePhase::Sorted => "sorted",
        }
    }

    pub(crate) fn require(
        self,
        expected: FramePhase,
        requested: &'static str,
    ) -> StrataResult<()> {
        if self == expected {
            Ok(())
        } else {
            Err(StrataError::FrameOutOfOrder {
                requested,
                current: self.name(),
            })
        }
    }
}

/// Frame-scoped state handed to every plugin and collector. Opaque to the render system beyond
/// the frame index.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderContext {
    frame_index: u64,
}

impl RenderContext {
    pub fn new(frame_index: u64) -> Self {
        RenderContext { frame_index }
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }
}

/// Sets up views (and optionally stage tables) at the start of every frame
pub trait RendererPlugin: Send + Sync {
    fn plugin_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn before_extract(
        &self,
        context: &mut BeforeExtractContext,
    ) -> StrataResult<()>;
}

/// Owns a set of render objects and feeds them into the frame
pub trait RenderCollector {
    fn collect(
        &self,
        context: &mut CollectContext,
    ) -> StrataResult<()>;
}

pub(crate) struct FrameView {
    pub(crate) view: RenderView,
    pub(crate) view_stages: Vec<RenderViewStage>,
    pub(crate) render_nodes: Vec<ViewStageRenderNodes>,
}

impl FrameView {
    pub(crate) fn view_stage_position(
        &self,
        render_stage: &RenderStage,
    ) -> Option<usize> {
        self.view_stages
            .iter()
            .position(|view_stage| view_stage.render_stage() == render_stage)
    }
}

#[derive(Default)]
pub(crate) struct RenderFrame {
    pub(crate) phase: FramePhase,
    pub(crate) frame_index: u64,
    pub(crate) views: Vec<FrameView>,
    // Bumped by every reset, so output collected before an abandon is never merged after it
    pub(crate) generation: u64,
    // Set while renderer plugins run, cleared by any reset
    pub(crate) extracting: bool,
}

impl RenderFrame {
    pub(crate) fn reset(
        &mut self,
        frame_index: u64,
    ) {
        self.phase = FramePhase::Idle;
        self.frame_index = frame_index;
        self.views.clear();
        self.extracting = false;
        self.generation = self.generation.wrapping_add(1);
    }
}

pub struct BeforeExtractContext<'a> {
    render_context: &'a RenderContext,
    render_system: &'a mut RenderSystem,
}

impl<'a> BeforeExtractContext<'a> {
    pub(crate) fn new(
        render_context: &'a RenderContext,
        render_system: &'a mut RenderSystem,
    ) -> Self {
        BeforeExtractContext {
            render_context,
            render_system,
        }
    }

    pub fn render_context(&self) -> &RenderContext {
        self.render_context
    }

    pub fn render_system(&self) -> &RenderSystem {
        self.render_system
    }

    /// Plugins may adjust stages, selectors and filters here. Collection has not started yet.
    pub fn render_system_mut(&mut self) -> &mut RenderSystem {
        self.render_system
    }

    pub fn add_view(
        &mut self,
        view_def: RenderViewDef,
    ) -> StrataResult<RenderViewIndex> {
        self.render_system.add_frame_view(view_def)
    }

    pub fn add_view_stage_filter(
        &mut self,
        view_index: RenderViewIndex,
        render_stage: &RenderStage,
        filter: Arc<dyn RenderStageFilter>,
    ) -> StrataResult<()> {
        self.render_system
            .set_frame_view_stage_filter(view_index, render_stage, filter)
    }
}

/// Draw lists gathered by one `CollectContext`, indexed by view and then by the position of the
/// stage within the view. Merged into the frame by `RenderSystem::end_collect`, which only
/// accepts output gathered for the frame in flight.
pub struct CollectOutput {
    pub(crate) frame_index: u64,
    pub(crate) frame_generation: u64,
    pub(crate) render_nodes: Vec<Vec<Vec<RenderNode>>>,
}

impl CollectOutput {
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Whether this output has one draw list per view stage of `views`
    pub(crate) fn matches_views(
        &self,
        views: &[FrameView],
    ) -> bool {
        self.render_nodes.len() == views.len()
            && self
                .render_nodes
                .iter()
                .zip(views)
                .all(|(view_nodes, frame_view)| view_nodes.len() == frame_view.view_stages.len())
    }

    pub fn node_count(&self) -> usize {
        self.render_nodes
            .iter()
            .flat_map(|view| view.iter())
            .map(|nodes| nodes.len())
            .sum()
    }
}

/// Runs render objects through selection, filtering and keying for every view of the frame. Only
/// borrows the render system immutably, so several contexts can be filled in parallel.
pub struct CollectContext<'a> {
    render_context: &'a RenderContext,
    render_system: &'a RenderSystem,
    active_render_stages: Vec<ActiveRenderStage>,
    output: CollectOutput,
}

impl<'a> CollectContext<'a> {
    pub(crate) fn new(
        render_context: &'a RenderContext,
        render_system: &'a RenderSystem,
    ) -> Self {
        let render_nodes = render_system
            .frame
            .views
            .iter()
            .map(|frame_view| vec![Vec::default(); frame_view.view_stages.len()])
            .collect();

        CollectContext {
            render_context,
            render_system,
            active_render_stages: Vec::default(),
            output: CollectOutput {
                frame_index: render_system.frame.frame_index,
                frame_generation: render_system.frame.generation,
                render_nodes,
            },
        }
    }

    pub fn render_context(&self) -> &RenderContext {
        self.render_context
    }

    pub fn views(&self) -> impl Iterator<Item = &RenderView> {
        self.render_system
            .frame
            .views
            .iter()
            .map(|frame_view| &frame_view.view)
    }

    pub fn into_output(self) -> CollectOutput {
        self.output
    }

    pub fn collect_render_object(
        &mut self,
        render_object: &RenderObject,
    ) -> StrataResult<()> {
        if !render_object.enabled {
            return Ok(());
        }

        let render_system = self.render_system;
        let object_type = render_object.object_type();
        let type_entry = match render_system.render_object_type_entry(object_type) {
            Some(type_entry) => type_entry,
            None => {
                log::warn!(
                    "Render object of unregistered type {} was collected, skipping it",
                    object_type.name()
                );
                return Ok(());
            }
        };

        let mut selected = false;
        for (view_position, frame_view) in render_system.frame.views.iter().enumerate() {
            let view = &frame_view.view;
            if !view.culling_mask().contains_group(render_object.render_group) {
                continue;
            }

            // Nothing this type can be selected into is drawn by the view
            if !view
                .render_stage_mask()
                .intersects(&type_entry.activation_mask)
            {
                continue;
            }

            if !selected {
                self.active_render_stages.clear();
                self.active_render_stages.resize(
                    render_system.registry().stage_slot_count(),
                    ActiveRenderStage::inactive(),
                );
                for (_, selector) in &type_entry.selectors {
                    selector.process(render_object, &mut self.active_render_stages);
                }
                selected = true;
            }

            let distance = view.distance_to(render_object.position);
            for (stage_position, view_stage) in frame_view.view_stages.iter().enumerate() {
                let render_stage = view_stage.render_stage();
                let effect_selector = match self
                    .active_render_stages
                    .get(render_stage.index() as usize)
                    .and_then(|active| active.effect_selector.as_ref())
                {
                    Some(effect_selector) => effect_selector,
                    None => continue,
                };

                if let Some(filter) = render_system.render_stage_filter(render_stage) {
                    if !filter.is_visible(render_object, view, view_stage) {
                        continue;
                    }
                }

                if let Some(filter) = view_stage.filter() {
                    if !filter.is_visible(render_object, view, view_stage) {
                        continue;
                    }
                }

                let sort_key = render_stage.sort_mode().sort_key_value(
                    type_entry.sort_id,
                    distance,
                    render_object.state_sort_key,
                );

                self.output.render_nodes[view_position][stage_position].push(RenderNode {
                    render_object_id: render_object.id(),
                    render_object_type: object_type,
                    render_stage_index: render_stage.index(),
                    effect_selector: effect_selector.clone(),
                    sort_key,
                    distance,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_requirements() {
        assert!(FramePhase::Extracted
            .require(FramePhase::Extracted, "collect")
            .is_ok());
        assert_eq!(
            FramePhase::Idle.require(FramePhase::Extracted, "collect"),
            Err(StrataError::FrameOutOfOrder {
                requested: "collect",
                current: "idle"
            })
        );
    }
}
