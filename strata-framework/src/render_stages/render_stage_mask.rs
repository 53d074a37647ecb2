use super::registry::{RenderStageIndex, RenderStageMaskInnerType, MAX_RENDER_STAGE_COUNT};
use super::RenderStage;

#[derive(Default)]
pub struct RenderStageMaskBuilder(RenderStageMaskInnerType);

impl RenderStageMaskBuilder {
    pub fn add_render_stage(
        mut self,
        render_stage: &RenderStage,
    ) -> RenderStageMaskBuilder {
        let index = render_stage.index();
        assert!(
            index < MAX_RENDER_STAGE_COUNT,
            "render stage {} has an invalid index",
            render_stage.name()
        );
        self.0 |= 1 << index;
        self
    }

    pub fn build(self) -> RenderStageMask {
        RenderStageMask(self.0)
    }
}

/// Bit per render stage index. Used by views to describe which stages they draw and by object
/// types to describe which stages they can ever be activated in, so a view that shares no stage
/// with an object type can reject its objects without running selectors.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderStageMask(RenderStageMaskInnerType);

impl RenderStageMask {
    pub fn is_included(
        &self,
        render_stage: &RenderStage,
    ) -> bool {
        self.is_included_index(render_stage.index())
    }

    #[inline(always)]
    pub fn is_included_index(
        &self,
        index: RenderStageIndex,
    ) -> bool {
        assert!(
            index < MAX_RENDER_STAGE_COUNT,
            "render stage index {} is invalid (did you forget to register a render stage?)",
            index
        );

        self.is_included_index_unchecked(index)
    }

    #[inline(always)]
    pub fn intersects(
        &self,
        other: &RenderStageMask,
    ) -> bool {
        (self.0 & other.0) != 0
    }

    pub fn insert_index(
        &mut self,
        index: RenderStageIndex,
    ) {
        assert!(index < MAX_RENDER_STAGE_COUNT);
        self.0 |= 1 << index;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn empty() -> Self {
        RenderStageMask(0)
    }

    #[inline(always)]
    fn is_included_index_unchecked(
        &self,
        index: RenderStageIndex,
    ) -> bool {
        (self.0 & 1 << index) != 0
    }
}
