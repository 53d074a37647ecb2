use super::{CollectContext, RenderCollector, RenderGroup};
use fnv::FnvHashMap;
use glam::Vec3;
use std::sync::atomic::{AtomicU32, Ordering};
use strata_api::StrataResult;

/// Identifies a kind of renderable object (i.e. meshes, sprites). Selectors, pipeline processors
/// and activation tables are all registered per object type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderObjectType(&'static str);

impl RenderObjectType {
    pub const fn new(name: &'static str) -> Self {
        RenderObjectType(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderObjectId(u32);

static NEXT_RENDER_OBJECT_ID: AtomicU32 = AtomicU32::new(1);

impl RenderObjectId {
    fn next() -> Self {
        RenderObjectId(NEXT_RENDER_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// The attributes of a renderable object that stage selection reads. Everything else about the
/// object (meshes, materials, transforms) lives outside of this crate.
#[derive(Clone, Debug)]
pub struct RenderObject {
    id: RenderObjectId,
    object_type: RenderObjectType,
    pub enabled: bool,
    pub render_group: RenderGroup,
    pub is_transparent: bool,
    pub casts_shadows: bool,
    pub position: Vec3,
    /// Material/pipeline bits packed into the state field of the sort key
    pub state_sort_key: u32,
}

impl RenderObject {
    pub fn new(object_type: RenderObjectType) -> Self {
        RenderObject {
            id: RenderObjectId::next(),
            object_type,
            enabled: true,
            render_group: RenderGroup::GROUP0,
            is_transparent: false,
            casts_shadows: false,
            position: Vec3::ZERO,
            state_sort_key: 0,
        }
    }

    pub fn id(&self) -> RenderObjectId {
        self.id
    }

    pub fn object_type(&self) -> RenderObjectType {
        self.object_type
    }

    pub fn with_render_group(
        mut self,
        render_group: RenderGroup,
    ) -> Self {
        self.render_group = render_group;
        self
    }

    pub fn with_transparency(
        mut self,
        is_transparent: bool,
    ) -> Self {
        self.is_transparent = is_transparent;
        self
    }

    pub fn with_shadow_casting(
        mut self,
        casts_shadows: bool,
    ) -> Self {
        self.casts_shadows = casts_shadows;
        self
    }

    pub fn with_position(
        mut self,
        position: Vec3,
    ) -> Self {
        self.position = position;
        self
    }

    pub fn with_state_sort_key(
        mut self,
        state_sort_key: u32,
    ) -> Self {
        self.state_sort_key = state_sort_key;
        self
    }

    pub fn with_enabled(
        mut self,
        enabled: bool,
    ) -> Self {
        self.enabled = enabled;
        self
    }
}

/// A collection of render objects of a single type. This is the simplest `RenderCollector`: it
/// feeds every object it owns into the frame.
pub struct RenderObjectSet {
    object_type: RenderObjectType,
    objects: Vec<RenderObject>,
    lookup: FnvHashMap<RenderObjectId, usize>,
}

impl RenderObjectSet {
    pub fn new(object_type: RenderObjectType) -> Self {
        RenderObjectSet {
            object_type,
            objects: Default::default(),
            lookup: Default::default(),
        }
    }

    pub fn object_type(&self) -> RenderObjectType {
        self.object_type
    }

    /// Panics if the object has another type than the set, or if an object with the same id (i.e.
    /// a clone of a registered object) is already in the set
    pub fn register_render_object(
        &mut self,
        render_object: RenderObject,
    ) -> RenderObjectId {
        assert_eq!(
            render_object.object_type(),
            self.object_type,
            "render object of type {} added to a set of type {}",
            render_object.object_type().name(),
            self.object_type.name()
        );

        let id = render_object.id();
        assert!(
            !self.lookup.contains_key(&id),
            "render object {:?} is already registered",
            id
        );
        self.lookup.insert(id, self.objects.len());
        self.objects.push(render_object);
        id
    }

    pub fn unregister_render_object(
        &mut self,
        id: RenderObjectId,
    ) -> Option<RenderObject> {
        let index = self.lookup.remove(&id)?;
        let removed = self.objects.swap_remove(index);
        if let Some(moved) = self.objects.get(index) {
            self.lookup.insert(moved.id(), index);
        }

        Some(removed)
    }

    pub fn get(
        &self,
        id: RenderObjectId,
    ) -> Option<&RenderObject> {
        self.lookup.get(&id).map(|index| &self.objects[*index])
    }

    pub fn get_mut(
        &mut self,
        id: RenderObjectId,
    ) -> Option<&mut RenderObject> {
        let index = *self.lookup.get(&id)?;
        self.objects.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenderObject> {
        self.objects.iter()
    }
}

impl RenderCollector for RenderObjectSet {
    fn collect(
        &self,
        context: &mut CollectContext,
    ) -> StrataResult<()> {
        for render_object in &self.objects {
            context.collect_render_object(render_object)?;
        }

        Ok(())
    }
}
