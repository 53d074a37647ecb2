//! Part of `strata-framework`. Decides which stage, which effect and which order every render
//! object is drawn with, once per frame.

mod sort_key;
pub use sort_key::quantize_distance;
pub use sort_key::SortKey;
pub use sort_key::SortKeyLayout;
pub use sort_key::SortKeyValue;
pub use sort_key::SortMode;
pub use sort_key::SORT_KEY_DISTANCE_BITS;
pub use sort_key::SORT_KEY_RENDERER_ID_POSITION;
pub use sort_key::SORT_KEY_STATE_BITS;

mod registry;
pub use registry::RenderStage;
pub use registry::RenderStageDesc;
pub use registry::RenderStageIndex;
pub use registry::RenderStageRegistry;
pub use registry::MAX_RENDER_STAGE_COUNT;

mod render_stage_mask;
pub use render_stage_mask::RenderStageMask;
pub use render_stage_mask::RenderStageMaskBuilder;

mod render_group;
pub use render_group::RenderGroup;
pub use render_group::RenderGroupMask;
pub use render_group::MAX_RENDER_GROUP_COUNT;

mod render_objects;
pub use render_objects::RenderObject;
pub use render_objects::RenderObjectId;
pub use render_objects::RenderObjectSet;
pub use render_objects::RenderObjectType;

mod render_views;
pub use render_views::RenderView;
pub use render_views::RenderViewCount;
pub use render_views::RenderViewDef;
pub use render_views::RenderViewIndex;
pub use render_views::RenderViewStage;

mod active_render_stage;
pub use active_render_stage::ActivationTable;
pub use active_render_stage::ActiveRenderStage;
pub use active_render_stage::EffectSelector;

mod selectors;
pub use selectors::RenderStageSelector;
pub use selectors::ShadowMapRenderStageSelector;
pub use selectors::SimpleGroupToRenderStageSelector;
pub use selectors::TransparentRenderStageSelector;

mod filters;
pub use filters::MaxDistanceFilter;
pub use filters::RenderGroupFilter;
pub use filters::RenderStageFilter;

mod render_nodes;
pub use render_nodes::RenderNode;
pub use render_nodes::RenderNodeReference;
pub use render_nodes::ViewStageRenderNodes;

mod pipeline_processor;
pub use pipeline_processor::PipelineProcessor;
pub use pipeline_processor::ShadowMapPipelineProcessor;
pub use pipeline_processor::TessellationPipelineProcessor;
pub use pipeline_processor::TransparentBlendPipelineProcessor;
pub use pipeline_processor::WireframePipelineProcessor;

mod frame;
pub use frame::BeforeExtractContext;
pub use frame::CollectContext;
pub use frame::CollectOutput;
pub use frame::FramePhase;
pub use frame::RenderCollector;
pub use frame::RenderContext;
pub use frame::RendererPlugin;

mod render_system;
pub use render_system::PipelineProcessorId;
pub use render_system::RenderObjectTypeEntry;
pub use render_system::RenderStageSelectorId;
pub use render_system::RenderSystem;

pub mod render_stages_prelude {
    pub use crate::render_stages::{
        ActiveRenderStage, BeforeExtractContext, CollectContext, EffectSelector, FramePhase,
        PipelineProcessor, RenderCollector, RenderContext, RenderGroup, RenderGroupMask,
        RenderNode, RenderNodeReference, RenderObject, RenderObjectId, RenderObjectSet,
        RenderObjectType, RenderStage, RenderStageDesc, RenderStageFilter, RenderStageIndex,
        RenderStageSelector, RenderSystem, RenderView, RenderViewDef, RenderViewIndex,
        RenderViewStage, RendererPlugin, SortMode,
    };
    pub use strata_api::{PipelineStateDescription, StrataError, StrataResult};
}
