use super::{ActiveRenderStage, EffectSelector, RenderGroupMask, RenderObject, RenderStage};

/// Decides, per object and per frame, which stages an object is drawn in and with which effect.
///
/// `process` receives one `ActiveRenderStage` per stage index. A selector must only activate the
/// stages it reports from `render_stage_activations`: those are validated when the selector is
/// registered and make up the activation table of the object type.
pub trait RenderStageSelector: Send + Sync {
    fn render_stage_activations(&self) -> Vec<(RenderStage, EffectSelector)>;

    fn process(
        &self,
        render_object: &RenderObject,
        active_render_stages: &mut [ActiveRenderStage],
    );
}

#[inline(always)]
fn activate(
    active_render_stages: &mut [ActiveRenderStage],
    render_stage: &RenderStage,
    effect_selector: &EffectSelector,
) {
    if let Some(active) = active_render_stages.get_mut(render_stage.index() as usize) {
        active.activate(effect_selector.clone());
    }
}

/// Sends objects of the masked render groups to an opaque or a transparent stage depending on the
/// object's transparency. Either stage may be left unset, in which case those objects are not
/// drawn by this selector.
pub struct TransparentRenderStageSelector {
    pub render_group: RenderGroupMask,
    pub opaque_render_stage: Option<RenderStage>,
    pub transparent_render_stage: Option<RenderStage>,
    effect_selector: EffectSelector,
    transparent_effect_selector: EffectSelector,
}

impl TransparentRenderStageSelector {
    pub fn new(
        render_group: RenderGroupMask,
        opaque_render_stage: Option<RenderStage>,
        transparent_render_stage: Option<RenderStage>,
        effect_name: &str,
    ) -> Self {
        TransparentRenderStageSelector {
            render_group,
            opaque_render_stage,
            transparent_render_stage,
            effect_selector: EffectSelector::new(effect_name),
            transparent_effect_selector: EffectSelector::new(effect_name),
        }
    }

    /// Use a different effect for the transparent stage (i.e. "MeshTransparent")
    pub fn with_transparent_effect_name(
        mut self,
        transparent_effect_name: &str,
    ) -> Self {
        self.transparent_effect_selector = EffectSelector::new(transparent_effect_name);
        self
    }

    pub fn effect_name(&self) -> &str {
        self.effect_selector.effect_name()
    }

    pub fn transparent_effect_name(&self) -> &str {
        self.transparent_effect_selector.effect_name()
    }
}

impl RenderStageSelector for TransparentRenderStageSelector {
    fn render_stage_activations(&self) -> Vec<(RenderStage, EffectSelector)> {
        let mut activations = Vec::with_capacity(2);
        if let Some(opaque) = &self.opaque_render_stage {
            activations.push((opaque.clone(), self.effect_selector.clone()));
        }
        if let Some(transparent) = &self.transparent_render_stage {
            activations.push((transparent.clone(), self.transparent_effect_selector.clone()));
        }
        activations
    }

    fn process(
        &self,
        render_object: &RenderObject,
        active_render_stages: &mut [ActiveRenderStage],
    ) {
        if !self.render_group.contains_group(render_object.render_group) {
            return;
        }

        if render_object.is_transparent {
            if let Some(transparent) = &self.transparent_render_stage {
                activate(
                    active_render_stages,
                    transparent,
                    &self.transparent_effect_selector,
                );
            }
        } else if let Some(opaque) = &self.opaque_render_stage {
            activate(active_render_stages, opaque, &self.effect_selector);
        }
    }
}

/// Sends every object of the masked render groups to a single stage
pub struct SimpleGroupToRenderStageSelector {
    pub render_group: RenderGroupMask,
    pub render_stage: RenderStage,
    effect_selector: EffectSelector,
}

impl SimpleGroupToRenderStageSelector {
    pub fn new(
        render_group: RenderGroupMask,
        render_stage: RenderStage,
        effect_name: &str,
    ) -> Self {
        SimpleGroupToRenderStageSelector {
            render_group,
            render_stage,
            effect_selector: EffectSelector::new(effect_name),
        }
    }
}

impl RenderStageSelector for SimpleGroupToRenderStageSelector {
    fn render_stage_activations(&self) -> Vec<(RenderStage, EffectSelector)> {
        vec![(self.render_stage.clone(), self.effect_selector.clone())]
    }

    fn process(
        &self,
        render_object: &RenderObject,
        active_render_stages: &mut [ActiveRenderStage],
    ) {
        if self.render_group.contains_group(render_object.render_group) {
            activate(
                active_render_stages,
                &self.render_stage,
                &self.effect_selector,
            );
        }
    }
}

/// Sends shadow casters of the masked render groups to a shadow map stage
pub struct ShadowMapRenderStageSelector {
    pub render_group: RenderGroupMask,
    pub shadow_map_render_stage: RenderStage,
    effect_selector: EffectSelector,
}

impl ShadowMapRenderStageSelector {
    pub fn new(
        render_group: RenderGroupMask,
        shadow_map_render_stage: RenderStage,
        effect_name: &str,
    ) -> Self {
        ShadowMapRenderStageSelector {
            render_group,
            shadow_map_render_stage,
            effect_selector: EffectSelector::new(effect_name),
        }
    }
}

impl RenderStageSelector for ShadowMapRenderStageSelector {
    fn render_stage_activations(&self) -> Vec<(RenderStage, EffectSelector)> {
        vec![(
            self.shadow_map_render_stage.clone(),
            self.effect_selector.clone(),
        )]
    }

    fn process(
        &self,
        render_object: &RenderObject,
        active_render_stages: &mut [ActiveRenderStage],
    ) {
        if render_object.casts_shadows
            && self.render_group.contains_group(render_object.render_group)
        {
            activate(
                active_render_stages,
                &self.shadow_map_render_stage,
                &self.effect_selector,
            );
        }
    }
}
