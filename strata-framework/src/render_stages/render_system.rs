use super::frame::{FrameView, RenderFrame};
use super::*;
use fnv::FnvHashMap;
use std::sync::Arc;
use strata_api::{PipelineStateDescription, StrataError, StrataResult};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RenderStageSelectorId(u64);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PipelineProcessorId(u64);

/// Everything registered for one render object type
pub struct RenderObjectTypeEntry {
    pub(crate) sort_id: u8,
    pub(crate) selectors: Vec<(RenderStageSelectorId, Arc<dyn RenderStageSelector>)>,
    pub(crate) pipeline_processors: Vec<(PipelineProcessorId, Arc<dyn PipelineProcessor>)>,
    pub(crate) activation_mask: RenderStageMask,
}

impl RenderObjectTypeEntry {
    /// Most significant byte of every sort key generated for this type
    pub fn sort_id(&self) -> u8 {
        self.sort_id
    }

    pub fn activation_mask(&self) -> RenderStageMask {
        self.activation_mask
    }

    pub fn selector_count(&self) -> usize {
        self.selectors.len()
    }

    pub fn pipeline_processor_count(&self) -> usize {
        self.pipeline_processors.len()
    }
}

/// The shared state that pipeline plugins register into and that drives each frame through
/// `before_extract`, `collect` and `sort`.
///
/// Setup (stages, object types, selectors, processors, filters) and frame execution are not
/// expected to overlap. Setup methods take `&mut self` so the borrow checker enforces this.
#[derive(Default)]
pub struct RenderSystem {
    registry: RenderStageRegistry,
    object_types: FnvHashMap<RenderObjectType, RenderObjectTypeEntry>,
    activation_table: ActivationTable,
    stage_filters: FnvHashMap<RenderStageIndex, Arc<dyn RenderStageFilter>>,
    next_selector_id: u64,
    next_processor_id: u64,
    pub(crate) frame: RenderFrame,
}

impl RenderSystem {
    pub fn registry(&self) -> &RenderStageRegistry {
        &self.registry
    }

    //
    // Stages
    //
    pub fn add_stage(
        &mut self,
        name: &str,
        sort_mode: SortMode,
    ) -> StrataResult<RenderStage> {
        self.registry.add_stage(name, sort_mode)
    }

    pub fn add_stage_desc(
        &mut self,
        desc: &RenderStageDesc,
    ) -> StrataResult<RenderStage> {
        self.registry.add_stage_desc(desc)
    }

    pub fn stage_by_name(
        &self,
        name: &str,
    ) -> Option<&RenderStage> {
        self.registry.stage_by_name(name)
    }

    /// Fails if any selector, pipeline processor or stage filter still refers to the stage. A
    /// frame in flight that draws the stage is abandoned, except during `before_extract` where a
    /// view of the frame being built still drawing the stage makes this fail.
    pub fn remove_stage(
        &mut self,
        render_stage: &RenderStage,
    ) -> StrataResult<()> {
        self.registry.validate(render_stage)?;

        let in_use = self.stage_filters.contains_key(&render_stage.index())
            || self.object_types.values().any(|type_entry| {
                type_entry.selectors.iter().any(|(_, selector)| {
                    selector
                        .render_stage_activations()
                        .iter()
                        .any(|(stage, _)| stage == render_stage)
                }) || type_entry.pipeline_processors.iter().any(|(_, processor)| {
                    processor.render_stages().contains(render_stage)
                })
            });

        if in_use {
            return Err(StrataError::RenderStageInUse(
                render_stage.name().to_string(),
            ));
        }

        let drawn_by_frame = self
            .frame
            .views
            .iter()
            .any(|frame_view| frame_view.view_stage_position(render_stage).is_some());
        if drawn_by_frame && self.frame.extracting {
            return Err(StrataError::RenderStageInUse(
                render_stage.name().to_string(),
            ));
        }

        if drawn_by_frame {
            log::debug!(
                "Render stage {} removed while the current frame draws it",
                render_stage.name()
            );
            self.abandon_frame();
        }

        self.activation_table.clear_stage(render_stage.index());
        self.registry.remove_stage(render_stage)
    }

    pub fn set_render_stage_filter(
        &mut self,
        render_stage: &RenderStage,
        filter: Option<Arc<dyn RenderStageFilter>>,
    ) -> StrataResult<()> {
        self.registry.validate(render_stage)?;
        match filter {
            Some(filter) => {
                self.stage_filters.insert(render_stage.index(), filter);
            }
            None => {
                self.stage_filters.remove(&render_stage.index());
            }
        }

        Ok(())
    }

    pub fn render_stage_filter(
        &self,
        render_stage: &RenderStage,
    ) -> Option<&Arc<dyn RenderStageFilter>> {
        self.stage_filters.get(&render_stage.index())
    }

    //
    // Object types
    //
    pub fn register_render_object_type(
        &mut self,
        object_type: RenderObjectType,
    ) -> StrataResult<u8> {
        if self.object_types.contains_key(&object_type) {
            return Err(StrataError::DuplicateRenderObjectType(object_type.name()));
        }

        let sort_id = (0..=u8::MAX)
            .find(|id| {
                !self
                    .object_types
                    .values()
                    .any(|type_entry| type_entry.sort_id == *id)
            })
            .ok_or_else(|| {
                StrataError::from(format!(
                    "cannot register render object type {}, every sort id is in use",
                    object_type.name()
                ))
            })?;

        log::debug!(
            "Register render object type {} with sort id {}",
            object_type.name(),
            sort_id
        );
        self.object_types.insert(
            object_type,
            RenderObjectTypeEntry {
                sort_id,
                selectors: Vec::default(),
                pipeline_processors: Vec::default(),
                activation_mask: RenderStageMask::empty(),
            },
        );

        Ok(sort_id)
    }

    pub fn unregister_render_object_type(
        &mut self,
        object_type: RenderObjectType,
    ) -> StrataResult<()> {
        self.object_types
            .remove(&object_type)
            .ok_or(StrataError::UnknownRenderObjectType(object_type.name()))?;
        self.activation_table.clear_type(object_type);
        log::debug!("Unregister render object type {}", object_type.name());
        Ok(())
    }

    pub fn is_render_object_type_registered(
        &self,
        object_type: RenderObjectType,
    ) -> bool {
        self.object_types.contains_key(&object_type)
    }

    pub fn render_object_type_entry(
        &self,
        object_type: RenderObjectType,
    ) -> Option<&RenderObjectTypeEntry> {
        self.object_types.get(&object_type)
    }

    fn render_object_type_entry_mut(
        &mut self,
        object_type: RenderObjectType,
    ) -> StrataResult<&mut RenderObjectTypeEntry> {
        self.object_types
            .get_mut(&object_type)
            .ok_or(StrataError::UnknownRenderObjectType(object_type.name()))
    }

    //
    // Selectors
    //
    pub fn add_render_stage_selector(
        &mut self,
        object_type: RenderObjectType,
        selector: Arc<dyn RenderStageSelector>,
    ) -> StrataResult<RenderStageSelectorId> {
        for (render_stage, _) in selector.render_stage_activations() {
            self.registry.validate(&render_stage)?;
        }

        let id = RenderStageSelectorId(self.next_selector_id);
        self.render_object_type_entry_mut(object_type)?
            .selectors
            .push((id, selector));
        self.next_selector_id += 1;

        self.rebuild_activations(object_type);
        Ok(id)
    }

    pub fn remove_render_stage_selector(
        &mut self,
        object_type: RenderObjectType,
        id: RenderStageSelectorId,
    ) -> StrataResult<()> {
        let type_entry = self.render_object_type_entry_mut(object_type)?;
        let position = type_entry
            .selectors
            .iter()
            .position(|(selector_id, _)| *selector_id == id)
            .ok_or_else(|| {
                StrataError::from(format!(
                    "selector {:?} is not registered for render object type {}",
                    id,
                    object_type.name()
                ))
            })?;
        type_entry.selectors.remove(position);

        self.rebuild_activations(object_type);
        Ok(())
    }

    fn rebuild_activations(
        &mut self,
        object_type: RenderObjectType,
    ) {
        self.activation_table.clear_type(object_type);

        let type_entry = match self.object_types.get_mut(&object_type) {
            Some(type_entry) => type_entry,
            None => return,
        };

        for (_, selector) in &type_entry.selectors {
            for (render_stage, effect_selector) in selector.render_stage_activations() {
                if let Some(existing) = self
                    .activation_table
                    .get(object_type, render_stage.index())
                    .and_then(|active| active.effect_selector.as_ref())
                {
                    if *existing != effect_selector {
                        log::warn!(
                            "Render object type {} has conflicting effects {} and {} for stage {}",
                            object_type.name(),
                            existing.effect_name(),
                            effect_selector.effect_name(),
                            render_stage.name()
                        );
                    }
                }

                self.activation_table
                    .set(object_type, &render_stage, effect_selector);
            }
        }

        type_entry.activation_mask = self.activation_table.stage_mask(object_type);
    }

    /// Whether objects of this type can be drawn in the stage, and with which effect
    pub fn active_render_stage(
        &self,
        object_type: RenderObjectType,
        render_stage: &RenderStage,
    ) -> Option<&ActiveRenderStage> {
        if !self.registry.contains(render_stage) {
            return None;
        }

        self.activation_table.get(object_type, render_stage.index())
    }

    //
    // Pipeline processors
    //
    pub fn add_pipeline_processor(
        &mut self,
        object_type: RenderObjectType,
        processor: Arc<dyn PipelineProcessor>,
    ) -> StrataResult<PipelineProcessorId> {
        for render_stage in processor.render_stages() {
            self.registry.validate(&render_stage)?;
        }

        let id = PipelineProcessorId(self.next_processor_id);
        self.render_object_type_entry_mut(object_type)?
            .pipeline_processors
            .push((id, processor));
        self.next_processor_id += 1;
        Ok(id)
    }

    pub fn remove_pipeline_processor(
        &mut self,
        object_type: RenderObjectType,
        id: PipelineProcessorId,
    ) -> StrataResult<()> {
        let type_entry = self.render_object_type_entry_mut(object_type)?;
        let position = type_entry
            .pipeline_processors
            .iter()
            .position(|(processor_id, _)| *processor_id == id)
            .ok_or_else(|| {
                StrataError::from(format!(
                    "pipeline processor {:?} is not registered for render object type {}",
                    id,
                    object_type.name()
                ))
            })?;
        type_entry.pipeline_processors.remove(position);
        Ok(())
    }

    /// Runs every pipeline processor of the node's object type, in registration order
    #[profiling::function]
    pub fn process_pipeline_state(
        &self,
        render_node_reference: RenderNodeReference,
        render_node: &RenderNode,
        render_object: &RenderObject,
        pipeline_state: &mut PipelineStateDescription,
    ) {
        if let Some(type_entry) = self.object_types.get(&render_node.render_object_type) {
            for (_, processor) in &type_entry.pipeline_processors {
                processor.process(
                    render_node_reference,
                    render_node,
                    render_object,
                    pipeline_state,
                );
            }
        }
    }

    /// Produces the final pipeline state of every node in a sorted draw list, starting from
    /// `base_pipeline_state`. Nodes whose object can no longer be found are skipped.
    #[profiling::function]
    pub fn prepare_pipeline_states<'o, F>(
        &self,
        view_index: RenderViewIndex,
        render_stage: &RenderStage,
        base_pipeline_state: &PipelineStateDescription,
        lookup_render_object: F,
    ) -> StrataResult<Vec<(RenderNodeReference, PipelineStateDescription)>>
    where
        F: Fn(RenderObjectId) -> Option<&'o RenderObject>,
    {
        let draw_list = self.draw_list(view_index, render_stage)?;
        let mut pipeline_states = Vec::with_capacity(draw_list.len());
        for (node_index, render_node) in draw_list.iter().enumerate() {
            let render_object = match lookup_render_object(render_node.render_object_id) {
                Some(render_object) => render_object,
                None => {
                    log::trace!(
                        "Render object {:?} is gone, skipping its pipeline state",
                        render_node.render_object_id
                    );
                    continue;
                }
            };

            let reference = RenderNodeReference {
                view_index,
                render_stage_index: render_stage.index(),
                node_index: node_index as u32,
            };

            let mut pipeline_state = *base_pipeline_state;
            self.process_pipeline_state(reference, render_node, render_object, &mut pipeline_state);
            pipeline_states.push((reference, pipeline_state));
        }

        Ok(pipeline_states)
    }

    //
    // Frame
    //
    pub fn frame_phase(&self) -> FramePhase {
        self.frame.phase
    }

    pub fn frame_index(&self) -> u64 {
        self.frame.frame_index
    }

    /// Discards every view and draw list of the current frame
    pub fn abandon_frame(&mut self) {
        log::trace!("Abandon frame {}", self.frame.frame_index);
        let frame_index = self.frame.frame_index;
        self.frame.reset(frame_index);
    }

    /// Starts a new frame: every renderer plugin gets to add its views. If a plugin fails the
    /// frame is abandoned.
    #[profiling::function]
    pub fn before_extract(
        &mut self,
        render_context: &RenderContext,
        renderer_plugins: &[Arc<dyn RendererPlugin>],
    ) -> StrataResult<()> {
        log::trace!("before_extract frame {}", render_context.frame_index());
        self.frame.reset(render_context.frame_index());

        self.frame.extracting = true;

        for plugin in renderer_plugins {
            let mut context = BeforeExtractContext::new(render_context, self);
            let result = plugin.before_extract(&mut context);

            // A reset clears the flag, which means views of earlier plugins are gone
            let result = result.and_then(|()| {
                if self.frame.extracting {
                    Ok(())
                } else {
                    Err(StrataError::FrameOutOfOrder {
                        requested: "before_extract",
                        current: self.frame.phase.name(),
                    })
                }
            });

            if let Err(e) = result {
                log::error!(
                    "Renderer plugin {} failed in before_extract: {}",
                    plugin.plugin_name(),
                    e
                );
                self.abandon_frame();
                return Err(e);
            }
        }

        self.frame.extracting = false;
        self.frame.phase = FramePhase::Extracted;
        Ok(())
    }

    /// Creates a context that a collector (possibly on another thread) fills. Requires
    /// `before_extract` to have run for this frame.
    pub fn begin_collect<'a>(
        &'a self,
        render_context: &'a RenderContext,
    ) -> StrataResult<CollectContext<'a>> {
        self.frame.phase.require(FramePhase::Extracted, "collect")?;
        if render_context.frame_index() != self.frame.frame_index {
            return Err(StrataError::from(format!(
                "collect for frame {} but the extracted frame is {}",
                render_context.frame_index(),
                self.frame.frame_index
            )));
        }

        Ok(CollectContext::new(render_context, self))
    }

    /// Appends the gathered draw lists to the frame, in the order given. Output from another frame,
    /// or from before the frame was abandoned, is rejected and nothing is merged.
    pub fn end_collect(
        &mut self,
        outputs: Vec<CollectOutput>,
    ) -> StrataResult<()> {
        self.frame.phase.require(FramePhase::Extracted, "collect")?;

        // Nothing is merged unless every output belongs to this frame
        for output in &outputs {
            if output.frame_index != self.frame.frame_index
                || output.frame_generation != self.frame.generation
            {
                return Err(StrataError::StaleCollectOutput {
                    output_frame: output.frame_index,
                    current_frame: self.frame.frame_index,
                });
            }

            if !output.matches_views(&self.frame.views) {
                return Err(StrataError::from(
                    "collect output does not match the views of the frame",
                ));
            }
        }

        for output in outputs {
            for (frame_view, view_nodes) in self.frame.views.iter_mut().zip(output.render_nodes) {
                for (stage_nodes, nodes) in frame_view.render_nodes.iter_mut().zip(view_nodes) {
                    stage_nodes.extend(nodes);
                }
            }
        }

        self.frame.phase = FramePhase::Collected;
        Ok(())
    }

    #[profiling::function]
    pub fn collect(
        &mut self,
        render_context: &RenderContext,
        collectors: &[&dyn RenderCollector],
    ) -> StrataResult<()> {
        let result = self.collect_outputs(render_context, collectors);
        let result = result.and_then(|outputs| self.end_collect(outputs));
        if let Err(e) = result {
            log::error!("Collect failed for frame {}: {}", self.frame.frame_index, e);
            self.abandon_frame();
            return Err(e);
        }

        log::trace!(
            "Collected {} render nodes for frame {}",
            self.frame
                .views
                .iter()
                .flat_map(|frame_view| frame_view.render_nodes.iter())
                .map(|nodes| nodes.len())
                .sum::<usize>(),
            self.frame.frame_index
        );
        Ok(())
    }

    fn collect_outputs(
        &self,
        render_context: &RenderContext,
        collectors: &[&dyn RenderCollector],
    ) -> StrataResult<Vec<CollectOutput>> {
        let mut outputs = Vec::with_capacity(collectors.len());
        for collector in collectors {
            let mut context = self.begin_collect(render_context)?;
            collector.collect(&mut context)?;
            outputs.push(context.into_output());
        }

        Ok(outputs)
    }

    #[profiling::function]
    pub fn sort(&mut self) -> StrataResult<()> {
        self.frame.phase.require(FramePhase::Collected, "sort")?;

        for frame_view in &mut self.frame.views {
            for render_nodes in &mut frame_view.render_nodes {
                render_nodes.sort();
            }
        }

        self.frame.phase = FramePhase::Sorted;
        Ok(())
    }

    pub fn views(&self) -> impl Iterator<Item = &RenderView> {
        self.frame.views.iter().map(|frame_view| &frame_view.view)
    }

    pub fn view(
        &self,
        view_index: RenderViewIndex,
    ) -> Option<&RenderView> {
        self.frame
            .views
            .get(view_index as usize)
            .map(|frame_view| &frame_view.view)
    }

    /// The sorted nodes of one view/stage pair. Only valid once the frame is sorted.
    pub fn draw_list(
        &self,
        view_index: RenderViewIndex,
        render_stage: &RenderStage,
    ) -> StrataResult<&[RenderNode]> {
        self.frame.phase.require(FramePhase::Sorted, "draw_list")?;

        let render_nodes = self.frame_view_stage(view_index, render_stage)?;
        Ok(render_nodes.sorted_render_nodes())
    }

    fn frame_view_stage(
        &self,
        view_index: RenderViewIndex,
        render_stage: &RenderStage,
    ) -> StrataResult<&ViewStageRenderNodes> {
        self.frame
            .views
            .get(view_index as usize)
            .and_then(|frame_view| {
                frame_view
                    .view_stage_position(render_stage)
                    .map(|position| &frame_view.render_nodes[position])
            })
            .ok_or_else(|| self.unknown_view_stage(view_index, render_stage))
    }

    fn unknown_view_stage(
        &self,
        view_index: RenderViewIndex,
        render_stage: &RenderStage,
    ) -> StrataError {
        StrataError::UnknownViewStage {
            view: self
                .view(view_index)
                .map(|view| view.debug_name().to_string())
                .unwrap_or_else(|| format!("#{}", view_index)),
            stage: render_stage.name().to_string(),
        }
    }

    pub(crate) fn add_frame_view(
        &mut self,
        view_def: RenderViewDef,
    ) -> StrataResult<RenderViewIndex> {
        for (i, view_stage) in view_def.render_stages.iter().enumerate() {
            let render_stage = view_stage.render_stage();
            self.registry.validate(render_stage)?;
            if view_def.render_stages[..i]
                .iter()
                .any(|other| other.render_stage() == render_stage)
            {
                return Err(StrataError::DuplicateRenderStage(
                    render_stage.name().to_string(),
                ));
            }
        }

        let view_index = self.frame.views.len() as RenderViewIndex;
        let view = RenderView::new(
            view_index,
            view_def.eye_position,
            view_def.view_dir,
            view_def.culling_mask,
            &view_def.render_stages,
            view_def.debug_name,
        );

        let render_nodes = view_def
            .render_stages
            .iter()
            .map(|view_stage| ViewStageRenderNodes::new(view_stage.render_stage().clone()))
            .collect();

        self.frame.views.push(FrameView {
            view,
            view_stages: view_def.render_stages,
            render_nodes,
        });

        Ok(view_index)
    }

    pub(crate) fn set_frame_view_stage_filter(
        &mut self,
        view_index: RenderViewIndex,
        render_stage: &RenderStage,
        filter: Arc<dyn RenderStageFilter>,
    ) -> StrataResult<()> {
        let position = self
            .frame
            .views
            .get(view_index as usize)
            .and_then(|frame_view| frame_view.view_stage_position(render_stage));

        match position {
            Some(position) => {
                self.frame.views[view_index as usize].view_stages[position].set_filter(filter);
                Ok(())
            }
            None => Err(self.unknown_view_stage(view_index, render_stage)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use strata_api::BlendFactor;

    const MESH: RenderObjectType = RenderObjectType::new("Mesh");
    const SPRITE: RenderObjectType = RenderObjectType::new("Sprite");

    struct TestViews {
        views: Vec<RenderViewDef>,
    }

    impl RendererPlugin for TestViews {
        fn before_extract(
            &self,
            context: &mut BeforeExtractContext,
        ) -> StrataResult<()> {
            for view in &self.views {
                context.add_view(view.clone())?;
            }
            Ok(())
        }
    }

    struct Setup {
        render_system: RenderSystem,
        opaque: RenderStage,
        transparent: RenderStage,
    }

    fn setup() -> Setup {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut render_system = RenderSystem::default();
        let opaque = render_system
            .add_stage("Opaque", SortMode::FrontToBack)
            .unwrap();
        let transparent = render_system
            .add_stage("Transparent", SortMode::BackToFront)
            .unwrap();
        render_system.register_render_object_type(MESH).unwrap();
        render_system
            .add_render_stage_selector(
                MESH,
                Arc::new(TransparentRenderStageSelector::new(
                    RenderGroupMask::GROUP0,
                    Some(opaque.clone()),
                    Some(transparent.clone()),
                    "Mesh",
                )),
            )
            .unwrap();

        Setup {
            render_system,
            opaque,
            transparent,
        }
    }

    fn main_view(setup: &Setup) -> Arc<dyn RendererPlugin> {
        Arc::new(TestViews {
            views: vec![RenderViewDef::new("main")
                .with_eye(Vec3::ZERO, -Vec3::Z)
                .with_render_stage(&setup.opaque)
                .with_render_stage(&setup.transparent)],
        })
    }

    fn ids(nodes: &[RenderNode]) -> Vec<RenderObjectId> {
        nodes.iter().map(|node| node.render_object_id).collect()
    }

    fn run_frame(
        setup: &mut Setup,
        frame_index: u64,
        plugins: &[Arc<dyn RendererPlugin>],
        objects: &RenderObjectSet,
    ) {
        let render_context = RenderContext::new(frame_index);
        setup
            .render_system
            .before_extract(&render_context, plugins)
            .unwrap();
        setup
            .render_system
            .collect(&render_context, &[objects])
            .unwrap();
        setup.render_system.sort().unwrap();
    }

    #[test]
    fn objects_are_routed_to_stages() {
        let mut setup = setup();
        let plugins = vec![main_view(&setup)];

        let mut objects = RenderObjectSet::new(MESH);
        let solid = objects.register_render_object(RenderObject::new(MESH));
        let glass =
            objects.register_render_object(RenderObject::new(MESH).with_transparency(true));
        let _hidden = objects.register_render_object(
            RenderObject::new(MESH).with_render_group(RenderGroup::GROUP1),
        );

        run_frame(&mut setup, 0, &plugins, &objects);

        let opaque = setup.render_system.draw_list(0, &setup.opaque).unwrap();
        assert_eq!(ids(opaque), vec![solid]);
        assert_eq!(opaque[0].effect_selector.effect_name(), "Mesh");

        let transparent = setup
            .render_system
            .draw_list(0, &setup.transparent)
            .unwrap();
        assert_eq!(ids(transparent), vec![glass]);
    }

    #[test]
    fn stages_are_sorted_by_distance() {
        let mut setup = setup();
        let plugins = vec![main_view(&setup)];

        let mut objects = RenderObjectSet::new(MESH);
        let at = |z: f32| RenderObject::new(MESH).with_position(Vec3::new(0.0, 0.0, -z));
        let far = objects.register_render_object(at(50.0));
        let near = objects.register_render_object(at(1.0));
        let mid = objects.register_render_object(at(10.0));
        let far_glass = objects.register_render_object(at(50.0).with_transparency(true));
        let near_glass = objects.register_render_object(at(1.0).with_transparency(true));

        run_frame(&mut setup, 0, &plugins, &objects);

        let opaque = setup.render_system.draw_list(0, &setup.opaque).unwrap();
        assert_eq!(ids(opaque), vec![near, mid, far]);

        let transparent = setup
            .render_system
            .draw_list(0, &setup.transparent)
            .unwrap();
        assert_eq!(ids(transparent), vec![far_glass, near_glass]);
    }

    #[test]
    fn collect_without_before_extract_is_rejected() {
        let mut setup = setup();
        let objects = RenderObjectSet::new(MESH);

        let result = setup
            .render_system
            .collect(&RenderContext::new(0), &[&objects]);
        assert_eq!(
            result,
            Err(StrataError::FrameOutOfOrder {
                requested: "collect",
                current: "idle"
            })
        );
        assert!(setup.render_system.sort().is_err());
        assert!(setup.render_system.draw_list(0, &setup.opaque).is_err());
    }

    #[test]
    fn collect_twice_is_rejected() {
        let mut setup = setup();
        let plugins = vec![main_view(&setup)];
        let objects = RenderObjectSet::new(MESH);
        let render_context = RenderContext::new(3);

        setup
            .render_system
            .before_extract(&render_context, &plugins)
            .unwrap();
        setup
            .render_system
            .collect(&render_context, &[&objects])
            .unwrap();
        assert!(setup
            .render_system
            .collect(&render_context, &[&objects])
            .is_err());

        // A stale context from another frame is rejected too
        setup
            .render_system
            .before_extract(&render_context, &plugins)
            .unwrap();
        assert!(setup
            .render_system
            .collect(&RenderContext::new(2), &[&objects])
            .is_err());
    }

    #[test]
    fn unknown_view_stage_is_an_error() {
        let mut setup = setup();
        let shadow = setup
            .render_system
            .add_stage("Shadow", SortMode::None)
            .unwrap();
        let plugins = vec![main_view(&setup)];
        run_frame(&mut setup, 0, &plugins, &RenderObjectSet::new(MESH));

        assert_eq!(
            setup.render_system.draw_list(0, &shadow),
            Err(StrataError::UnknownViewStage {
                view: "main".to_string(),
                stage: "Shadow".to_string()
            })
        );
        assert!(setup.render_system.draw_list(7, &setup.opaque).is_err());
    }

    #[test]
    fn filters_and_culling() {
        let mut setup = setup();
        let opaque = setup.opaque.clone();
        let transparent = setup.transparent.clone();

        struct FilteredViews {
            opaque: RenderStage,
            transparent: RenderStage,
        }

        impl RendererPlugin for FilteredViews {
            fn before_extract(
                &self,
                context: &mut BeforeExtractContext,
            ) -> StrataResult<()> {
                let view_index = context.add_view(
                    RenderViewDef::new("filtered")
                        .with_render_stage(&self.opaque)
                        .with_render_stage(&self.transparent),
                )?;
                context.add_view_stage_filter(
                    view_index,
                    &self.opaque,
                    Arc::new(|object: &RenderObject, _: &RenderView, _: &RenderViewStage| {
                        object.state_sort_key != 13
                    }),
                )?;

                context.add_view(
                    RenderViewDef::new("culled")
                        .with_culling_mask(RenderGroupMask::GROUP1)
                        .with_render_stage(&self.opaque),
                )?;
                Ok(())
            }
        }

        let plugins: Vec<Arc<dyn RendererPlugin>> = vec![Arc::new(FilteredViews {
            opaque: opaque.clone(),
            transparent: transparent.clone(),
        })];

        setup
            .render_system
            .set_render_stage_filter(
                &transparent,
                Some(Arc::new(MaxDistanceFilter { max_distance: 5.0 })),
            )
            .unwrap();

        let mut objects = RenderObjectSet::new(MESH);
        let kept = objects.register_render_object(RenderObject::new(MESH));
        let _vetoed =
            objects.register_render_object(RenderObject::new(MESH).with_state_sort_key(13));
        let _disabled = objects.register_render_object(RenderObject::new(MESH).with_enabled(false));
        let _too_far = objects.register_render_object(
            RenderObject::new(MESH)
                .with_transparency(true)
                .with_position(Vec3::new(0.0, 0.0, -20.0)),
        );

        run_frame(&mut setup, 0, &plugins, &objects);

        let render_system = &setup.render_system;
        assert_eq!(ids(render_system.draw_list(0, &opaque).unwrap()), vec![kept]);
        assert!(render_system.draw_list(0, &transparent).unwrap().is_empty());
        assert!(render_system.draw_list(1, &opaque).unwrap().is_empty());

        // Stage filters keep their stage alive
        let mut render_system = setup.render_system;
        assert_eq!(
            render_system.remove_stage(&transparent),
            Err(StrataError::RenderStageInUse("Transparent".to_string()))
        );
    }

    #[test]
    fn filter_on_missing_view_stage_is_rejected() {
        let mut setup = setup();
        let shadow = setup
            .render_system
            .add_stage("Shadow", SortMode::None)
            .unwrap();

        struct BadFilter {
            opaque: RenderStage,
            shadow: RenderStage,
        }

        impl RendererPlugin for BadFilter {
            fn before_extract(
                &self,
                context: &mut BeforeExtractContext,
            ) -> StrataResult<()> {
                let view_index =
                    context.add_view(RenderViewDef::new("main").with_render_stage(&self.opaque))?;
                context.add_view_stage_filter(
                    view_index,
                    &self.shadow,
                    Arc::new(RenderGroupFilter::new(RenderGroupMask::ALL)),
                )
            }
        }

        let plugins: Vec<Arc<dyn RendererPlugin>> = vec![Arc::new(BadFilter {
            opaque: setup.opaque.clone(),
            shadow,
        })];

        let result = setup
            .render_system
            .before_extract(&RenderContext::new(0), &plugins);
        assert!(matches!(result, Err(StrataError::UnknownViewStage { .. })));
        assert_eq!(setup.render_system.frame_phase(), FramePhase::Idle);
        assert_eq!(setup.render_system.views().count(), 0);
    }

    #[test]
    fn selectors_are_validated_and_block_removal() {
        let mut setup = setup();
        let mut other = RenderSystem::default();
        let foreign = other.add_stage("Foreign", SortMode::None).unwrap();

        setup
            .render_system
            .register_render_object_type(SPRITE)
            .unwrap();
        let result = setup.render_system.add_render_stage_selector(
            SPRITE,
            Arc::new(SimpleGroupToRenderStageSelector::new(
                RenderGroupMask::ALL,
                foreign,
                "Sprite",
            )),
        );
        assert_eq!(
            result,
            Err(StrataError::UnknownRenderStage("Foreign".to_string()))
        );

        let opaque = setup.opaque.clone();
        assert_eq!(
            setup.render_system.remove_stage(&opaque),
            Err(StrataError::RenderStageInUse("Opaque".to_string()))
        );
    }

    #[test]
    fn activation_table_follows_selectors() {
        let mut setup = setup();
        let shadow = setup
            .render_system
            .add_stage("ShadowMapCaster", SortMode::FrontToBack)
            .unwrap();

        assert!(setup
            .render_system
            .active_render_stage(MESH, &shadow)
            .is_none());

        let id = setup
            .render_system
            .add_render_stage_selector(
                MESH,
                Arc::new(ShadowMapRenderStageSelector::new(
                    RenderGroupMask::ALL,
                    shadow.clone(),
                    "ShadowMapCaster",
                )),
            )
            .unwrap();

        let active = setup
            .render_system
            .active_render_stage(MESH, &shadow)
            .unwrap();
        assert_eq!(
            active.effect_selector.as_ref().unwrap().effect_name(),
            "ShadowMapCaster"
        );
        assert!(setup
            .render_system
            .render_object_type_entry(MESH)
            .unwrap()
            .activation_mask()
            .is_included(&shadow));

        setup
            .render_system
            .remove_render_stage_selector(MESH, id)
            .unwrap();
        assert!(setup
            .render_system
            .active_render_stage(MESH, &shadow)
            .is_none());
        setup.render_system.remove_stage(&shadow).unwrap();
    }

    #[test]
    fn object_types_get_distinct_sort_ids() {
        let mut render_system = RenderSystem::default();
        assert_eq!(render_system.register_render_object_type(MESH), Ok(0));
        assert_eq!(render_system.register_render_object_type(SPRITE), Ok(1));
        assert_eq!(
            render_system.register_render_object_type(MESH),
            Err(StrataError::DuplicateRenderObjectType("Mesh"))
        );

        render_system.unregister_render_object_type(MESH).unwrap();
        assert_eq!(render_system.register_render_object_type(MESH), Ok(0));
    }

    #[test]
    fn pipeline_states_are_processed_in_draw_order() {
        let mut setup = setup();
        let transparent = setup.transparent.clone();
        setup
            .render_system
            .add_pipeline_processor(
                MESH,
                Arc::new(TransparentBlendPipelineProcessor {
                    transparent_render_stage: transparent.clone(),
                }),
            )
            .unwrap();

        let plugins = vec![main_view(&setup)];
        let mut objects = RenderObjectSet::new(MESH);
        let glass =
            objects.register_render_object(RenderObject::new(MESH).with_transparency(true));
        run_frame(&mut setup, 0, &plugins, &objects);

        let states = setup
            .render_system
            .prepare_pipeline_states(
                0,
                &transparent,
                &PipelineStateDescription::default(),
                |id| objects.get(id),
            )
            .unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].0.node_index, 0);
        assert_eq!(states[0].1.blend_state.src_factor, BlendFactor::SrcAlpha);
        assert!(objects.get(glass).is_some());

        let opaque = setup.opaque.clone();
        let states = setup
            .render_system
            .prepare_pipeline_states(
                0,
                &opaque,
                &PipelineStateDescription::default(),
                |id| objects.get(id),
            )
            .unwrap();
        assert!(states.is_empty());
    }

    #[test]
    fn collectors_can_run_in_parallel() {
        let mut setup = setup();
        let plugins = vec![main_view(&setup)];
        let render_context = RenderContext::new(0);
        setup
            .render_system
            .before_extract(&render_context, &plugins)
            .unwrap();

        let mut first = RenderObjectSet::new(MESH);
        let a = first.register_render_object(RenderObject::new(MESH).with_state_sort_key(1));
        let mut second = RenderObjectSet::new(MESH);
        let b = second.register_render_object(RenderObject::new(MESH).with_state_sort_key(2));

        let render_system = &setup.render_system;
        let outputs = std::thread::scope(|scope| {
            let handles: Vec<_> = [&first, &second]
                .into_iter()
                .map(|set| {
                    let render_context = &render_context;
                    scope.spawn(move || {
                        let mut context = render_system.begin_collect(render_context).unwrap();
                        set.collect(&mut context).unwrap();
                        context.into_output()
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect::<Vec<_>>()
        });
        assert_eq!(outputs.iter().map(|o| o.node_count()).sum::<usize>(), 2);

        setup.render_system.end_collect(outputs).unwrap();
        setup.render_system.sort().unwrap();

        let opaque = setup.render_system.draw_list(0, &setup.opaque).unwrap();
        assert_eq!(ids(opaque), vec![a, b]);
    }

    #[test]
    fn removing_a_drawn_stage_abandons_the_frame() {
        let mut render_system = RenderSystem::default();
        let debug = render_system.add_stage("Debug", SortMode::None).unwrap();

        struct DebugView(RenderStage);
        impl RendererPlugin for DebugView {
            fn before_extract(
                &self,
                context: &mut BeforeExtractContext,
            ) -> StrataResult<()> {
                context.add_view(RenderViewDef::new("debug").with_render_stage(&self.0))?;
                Ok(())
            }
        }

        let plugins: Vec<Arc<dyn RendererPlugin>> = vec![Arc::new(DebugView(debug.clone()))];
        render_system
            .before_extract(&RenderContext::new(0), &plugins)
            .unwrap();
        assert_eq!(render_system.frame_phase(), FramePhase::Extracted);

        render_system.remove_stage(&debug).unwrap();
        assert_eq!(render_system.frame_phase(), FramePhase::Idle);
        assert_eq!(render_system.views().count(), 0);
    }

    fn collect_into_output(
        render_system: &RenderSystem,
        render_context: &RenderContext,
        objects: &RenderObjectSet,
    ) -> CollectOutput {
        let mut context = render_system.begin_collect(render_context).unwrap();
        objects.collect(&mut context).unwrap();
        context.into_output()
    }

    #[test]
    fn output_of_another_frame_is_not_merged() {
        let mut setup = setup();
        let plugins = vec![main_view(&setup)];
        let mut objects = RenderObjectSet::new(MESH);
        objects.register_render_object(RenderObject::new(MESH));

        let frame_0 = RenderContext::new(0);
        setup
            .render_system
            .before_extract(&frame_0, &plugins)
            .unwrap();
        let stale = collect_into_output(&setup.render_system, &frame_0, &objects);
        assert_eq!(stale.frame_index(), 0);

        let frame_1 = RenderContext::new(1);
        setup
            .render_system
            .before_extract(&frame_1, &plugins)
            .unwrap();
        let fresh = collect_into_output(&setup.render_system, &frame_1, &objects);
        assert_eq!(
            setup.render_system.end_collect(vec![fresh, stale]),
            Err(StrataError::StaleCollectOutput {
                output_frame: 0,
                current_frame: 1
            })
        );
        assert_eq!(setup.render_system.frame_phase(), FramePhase::Extracted);

        let fresh = collect_into_output(&setup.render_system, &frame_1, &objects);
        setup.render_system.end_collect(vec![fresh]).unwrap();
        setup.render_system.sort().unwrap();
        let opaque = setup.render_system.draw_list(0, &setup.opaque).unwrap();
        assert_eq!(opaque.len(), 1);
    }

    #[test]
    fn output_from_before_an_abandon_is_not_merged() {
        let mut setup = setup();
        let plugins = vec![main_view(&setup)];
        let mut objects = RenderObjectSet::new(MESH);
        objects.register_render_object(RenderObject::new(MESH));

        let render_context = RenderContext::new(0);
        setup
            .render_system
            .before_extract(&render_context, &plugins)
            .unwrap();
        let stale = collect_into_output(&setup.render_system, &render_context, &objects);

        setup.render_system.abandon_frame();
        setup
            .render_system
            .before_extract(&render_context, &plugins)
            .unwrap();
        assert_eq!(
            setup.render_system.end_collect(vec![stale]),
            Err(StrataError::StaleCollectOutput {
                output_frame: 0,
                current_frame: 0
            })
        );
    }

    struct AddViewPlugin(RenderViewDef);

    impl RendererPlugin for AddViewPlugin {
        fn before_extract(
            &self,
            context: &mut BeforeExtractContext,
        ) -> StrataResult<()> {
            context.add_view(self.0.clone())?;
            Ok(())
        }
    }

    struct RemoveStagePlugin(RenderStage);

    impl RendererPlugin for RemoveStagePlugin {
        fn before_extract(
            &self,
            context: &mut BeforeExtractContext,
        ) -> StrataResult<()> {
            context.render_system_mut().remove_stage(&self.0)
        }
    }

    #[test]
    fn removing_a_stage_drawn_by_the_frame_being_extracted_fails() {
        let mut setup = setup();
        let debug = setup
            .render_system
            .add_stage("Debug", SortMode::None)
            .unwrap();
        let plugins = vec![
            Arc::new(AddViewPlugin(
                RenderViewDef::new("main")
                    .with_render_stage(&setup.opaque)
                    .with_render_stage(&debug),
            )) as Arc<dyn RendererPlugin>,
            Arc::new(RemoveStagePlugin(debug.clone())),
        ];

        assert_eq!(
            setup
                .render_system
                .before_extract(&RenderContext::new(0), &plugins),
            Err(StrataError::RenderStageInUse("Debug".to_string()))
        );
        assert_eq!(setup.render_system.frame_phase(), FramePhase::Idle);
        assert_eq!(setup.render_system.views().count(), 0);
        assert!(setup.render_system.registry().contains(&debug));

        // Stages no view of the frame draws can still be removed
        let unused = setup
            .render_system
            .add_stage("Unused", SortMode::None)
            .unwrap();
        let plugins = vec![
            Arc::new(AddViewPlugin(
                RenderViewDef::new("main").with_render_stage(&setup.opaque),
            )) as Arc<dyn RendererPlugin>,
            Arc::new(RemoveStagePlugin(unused)),
        ];
        setup
            .render_system
            .before_extract(&RenderContext::new(1), &plugins)
            .unwrap();
        assert_eq!(setup.render_system.views().count(), 1);
    }

    struct AbandonPlugin;

    impl RendererPlugin for AbandonPlugin {
        fn before_extract(
            &self,
            context: &mut BeforeExtractContext,
        ) -> StrataResult<()> {
            context.render_system_mut().abandon_frame();
            Ok(())
        }
    }

    #[test]
    fn abandoning_during_before_extract_fails_the_frame() {
        let mut setup = setup();
        let abandon: Arc<dyn RendererPlugin> = Arc::new(AbandonPlugin);
        let plugins = vec![main_view(&setup), abandon];

        assert_eq!(
            setup
                .render_system
                .before_extract(&RenderContext::new(0), &plugins),
            Err(StrataError::FrameOutOfOrder {
                requested: "before_extract",
                current: "idle"
            })
        );
        assert_eq!(setup.render_system.frame_phase(), FramePhase::Idle);
    }

    struct FailingCollector;

    impl RenderCollector for FailingCollector {
        fn collect(
            &self,
            _context: &mut CollectContext,
        ) -> StrataResult<()> {
            Err("lost the scene".into())
        }
    }

    #[test]
    fn failed_collector_abandons_the_frame() {
        let mut setup = setup();
        let plugins = vec![main_view(&setup)];
        let mut objects = RenderObjectSet::new(MESH);
        objects.register_render_object(RenderObject::new(MESH));

        let render_context = RenderContext::new(0);
        setup
            .render_system
            .before_extract(&render_context, &plugins)
            .unwrap();
        let collectors: [&dyn RenderCollector; 2] = [&objects, &FailingCollector];
        let result = setup.render_system.collect(&render_context, &collectors);
        assert_eq!(
            result,
            Err(StrataError::StringError("lost the scene".to_string()))
        );
        assert_eq!(setup.render_system.frame_phase(), FramePhase::Idle);
        assert_eq!(setup.render_system.views().count(), 0);
    }
}
