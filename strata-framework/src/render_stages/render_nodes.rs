use super::{
    EffectSelector, RenderObjectId, RenderObjectType, RenderStage, RenderStageIndex,
    RenderViewIndex, SortKey, SortKeyValue, SortMode,
};

/// Points at a single render node of the current frame
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RenderNodeReference {
    pub view_index: RenderViewIndex,
    pub render_stage_index: RenderStageIndex,
    pub node_index: u32,
}

/// One (object, view, stage) combination that survived selection and filtering. The effect
/// selector says which shader variant the draw uses.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderNode {
    pub render_object_id: RenderObjectId,
    pub render_object_type: RenderObjectType,
    pub render_stage_index: RenderStageIndex,
    pub effect_selector: EffectSelector,
    pub sort_key: SortKeyValue,
    pub distance: f32,
}

/// The draw list of one stage in one view. Nodes are appended during collect and ordered by
/// `sort`.
pub struct ViewStageRenderNodes {
    render_stage: RenderStage,
    render_nodes: Vec<RenderNode>,
    sort_keys: Vec<SortKey>,
    sorted_render_nodes: Vec<RenderNode>,
    is_sorted: bool,
}

impl ViewStageRenderNodes {
    pub fn new(render_stage: RenderStage) -> Self {
        ViewStageRenderNodes {
            render_stage,
            render_nodes: Vec::default(),
            sort_keys: Vec::default(),
            sorted_render_nodes: Vec::default(),
            is_sorted: false,
        }
    }

    pub fn render_stage(&self) -> &RenderStage {
        &self.render_stage
    }

    pub fn len(&self) -> usize {
        self.render_nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.render_nodes.is_empty()
    }

    pub fn extend(
        &mut self,
        render_nodes: impl IntoIterator<Item = RenderNode>,
    ) {
        self.render_nodes.extend(render_nodes);
        self.is_sorted = false;
    }

    /// Nodes in the order they were collected
    pub fn render_nodes(&self) -> &[RenderNode] {
        &self.render_nodes
    }

    /// Nodes in draw order. Empty until `sort` is called.
    pub fn sorted_render_nodes(&self) -> &[RenderNode] {
        &self.sorted_render_nodes
    }

    pub fn is_sorted(&self) -> bool {
        self.is_sorted
    }

    /// Generates a key per node (stable index = collection order), sorts the keys and then
    /// reorders the nodes by the key's index. With `SortMode::None` the collection order is kept.
    #[profiling::function]
    pub fn sort(&mut self) {
        self.sorted_render_nodes.clear();
        self.sorted_render_nodes.reserve(self.render_nodes.len());

        if self.render_stage.sort_mode() == SortMode::None {
            self.sorted_render_nodes
                .extend(self.render_nodes.iter().cloned());
        } else {
            self.sort_keys.clear();
            self.sort_keys.extend(
                self.render_nodes
                    .iter()
                    .enumerate()
                    .map(|(i, node)| SortKey::new(node.sort_key, i as i32, i as i32)),
            );
            self.sort_keys.sort_unstable();

            for sort_key in &self.sort_keys {
                self.sorted_render_nodes
                    .push(self.render_nodes[sort_key.index as usize].clone());
            }
        }

        log::trace!(
            "Sorted {} nodes for stage {}",
            self.sorted_render_nodes.len(),
            self.render_stage.name()
        );
        self.is_sorted = true;
    }

    pub fn clear(&mut self) {
        self.render_nodes.clear();
        self.sort_keys.clear();
        self.sorted_render_nodes.clear();
        self.is_sorted = false;
    }
}
