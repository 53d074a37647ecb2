use super::SortMode;
use fnv::FnvHashMap;
#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strata_api::{StrataError, StrataResult};

/// The `ID` of a registered `RenderStage`. Used to index activation tables and stage masks.
pub type RenderStageIndex = u32;

pub type RenderStageMaskInnerType = u32;
pub const MAX_RENDER_STAGE_COUNT: u32 = 32;

/// Data-driven description of a stage, used by builders and plugins to register stages.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct RenderStageDesc {
    pub name: String,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub sort_mode: SortMode,
}

impl RenderStageDesc {
    pub fn new(
        name: &str,
        sort_mode: SortMode,
    ) -> Self {
        RenderStageDesc {
            name: name.to_string(),
            sort_mode,
        }
    }
}

struct RenderStageInner {
    name: String,
    index: RenderStageIndex,
    sort_mode: SortMode,
}

/// A named phase of the frame (i.e. opaque geometry, transparent geometry, shadow casters). Two
/// handles are equal only if they came from the same registration, so a stage that was removed
/// and re-added under the same name is a different stage.
#[derive(Clone)]
pub struct RenderStage {
    inner: Arc<RenderStageInner>,
}

impl RenderStage {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[inline(always)]
    pub fn index(&self) -> RenderStageIndex {
        self.inner.index
    }

    pub fn sort_mode(&self) -> SortMode {
        self.inner.sort_mode
    }
}

impl PartialEq for RenderStage {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for RenderStage {}

impl std::fmt::Debug for RenderStage {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("RenderStage")
            .field("name", &self.inner.name)
            .field("index", &self.inner.index)
            .field("sort_mode", &self.inner.sort_mode)
            .finish()
    }
}

/// Owns the set of registered stages. Indices of removed stages are handed out again to the next
/// stage that gets added, so activation tables never grow past `MAX_RENDER_STAGE_COUNT`.
#[derive(Default)]
pub struct RenderStageRegistry {
    stages: Vec<Option<RenderStage>>,
    stage_name_to_index: FnvHashMap<String, RenderStageIndex>,
}

impl RenderStageRegistry {
    pub fn add_stage(
        &mut self,
        name: &str,
        sort_mode: SortMode,
    ) -> StrataResult<RenderStage> {
        if self.stage_name_to_index.contains_key(name) {
            return Err(StrataError::DuplicateRenderStage(name.to_string()));
        }

        let index = match self.stages.iter().position(|stage| stage.is_none()) {
            Some(free_index) => free_index,
            None => {
                if self.stages.len() >= MAX_RENDER_STAGE_COUNT as usize {
                    return Err(StrataError::TooManyRenderStages(MAX_RENDER_STAGE_COUNT));
                }

                self.stages.push(None);
                self.stages.len() - 1
            }
        };

        let stage = RenderStage {
            inner: Arc::new(RenderStageInner {
                name: name.to_string(),
                index: index as RenderStageIndex,
                sort_mode,
            }),
        };

        log::debug!("Register render stage {} at index {}", name, index);
        self.stages[index] = Some(stage.clone());
        self.stage_name_to_index
            .insert(name.to_string(), index as RenderStageIndex);
        Ok(stage)
    }

    pub fn add_stage_desc(
        &mut self,
        desc: &RenderStageDesc,
    ) -> StrataResult<RenderStage> {
        self.add_stage(&desc.name, desc.sort_mode)
    }

    pub fn remove_stage(
        &mut self,
        stage: &RenderStage,
    ) -> StrataResult<()> {
        self.validate(stage)?;

        log::debug!(
            "Remove render stage {} at index {}",
            stage.name(),
            stage.index()
        );
        self.stages[stage.index() as usize] = None;
        self.stage_name_to_index.remove(stage.name());

        // Keep the table as short as possible so per-object scratch buffers stay small
        while let Some(None) = self.stages.last() {
            self.stages.pop();
        }

        Ok(())
    }

    /// Returns `true` if this exact stage (not just one with the same name) is registered
    pub fn contains(
        &self,
        stage: &RenderStage,
    ) -> bool {
        matches!(
            self.stages.get(stage.index() as usize),
            Some(Some(registered)) if registered == stage
        )
    }

    pub fn validate(
        &self,
        stage: &RenderStage,
    ) -> StrataResult<()> {
        if self.contains(stage) {
            Ok(())
        } else {
            Err(StrataError::UnknownRenderStage(stage.name().to_string()))
        }
    }

    pub fn stage(
        &self,
        index: RenderStageIndex,
    ) -> Option<&RenderStage> {
        self.stages.get(index as usize).and_then(|stage| stage.as_ref())
    }

    pub fn stage_by_name(
        &self,
        name: &str,
    ) -> Option<&RenderStage> {
        self.stage_name_to_index
            .get(name)
            .and_then(|index| self.stage(*index))
    }

    /// Upper bound (exclusive) of the indices currently in use
    pub fn stage_slot_count(&self) -> usize {
        self.stages.len()
    }

    pub fn registered_stage_count(&self) -> usize {
        self.stage_name_to_index.len()
    }

    pub fn stages(&self) -> impl Iterator<Item = &RenderStage> {
        self.stages.iter().filter_map(|stage| stage.as_ref())
    }
}
