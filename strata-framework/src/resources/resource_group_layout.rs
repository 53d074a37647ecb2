use crate::render_stages::RenderViewIndex;
use fnv::FnvHashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use strata_api::{StrataError, StrataResult};

/// Identity of a built layout. Offset references remember the layout that produced them in debug
/// builds so that using them against another layout is caught.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceGroupLayoutId(u32);

static NEXT_RESOURCE_GROUP_LAYOUT_ID: AtomicU32 = AtomicU32::new(1);

impl ResourceGroupLayoutId {
    const INVALID: ResourceGroupLayoutId = ResourceGroupLayoutId(0);

    fn next() -> Self {
        ResourceGroupLayoutId(NEXT_RESOURCE_GROUP_LAYOUT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Byte offset of a named constant-buffer member within one layout. `-1` means the layout does
/// not declare the member, which is normal for shader variants that skip optional members.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConstantBufferOffsetReference {
    offset: i32,
    size: u32,
    #[cfg(debug_assertions)]
    layout_id: ResourceGroupLayoutId,
}

impl ConstantBufferOffsetReference {
    pub fn invalid() -> Self {
        ConstantBufferOffsetReference {
            offset: -1,
            size: 0,
            #[cfg(debug_assertions)]
            layout_id: ResourceGroupLayoutId::INVALID,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.offset >= 0
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    /// Size in bytes of the member, `0` when invalid
    pub fn size(&self) -> u32 {
        self.size
    }
}

impl Default for ConstantBufferOffsetReference {
    fn default() -> Self {
        Self::invalid()
    }
}

/// Index of a named logical group (i.e. a texture/sampler set) within one layout. `-1` means
/// missing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LogicalGroupReference {
    index: i32,
    #[cfg(debug_assertions)]
    layout_id: ResourceGroupLayoutId,
}

impl LogicalGroupReference {
    pub fn invalid() -> Self {
        LogicalGroupReference {
            index: -1,
            #[cfg(debug_assertions)]
            layout_id: ResourceGroupLayoutId::INVALID,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.index >= 0
    }

    pub fn index(&self) -> i32 {
        self.index
    }
}

impl Default for LogicalGroupReference {
    fn default() -> Self {
        Self::invalid()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConstantBufferMember {
    pub offset: u32,
    pub size: u32,
}

/// Collects the members and logical groups reported by shader reflection
#[derive(Default)]
pub struct ResourceGroupLayoutBuilder {
    constant_buffer_members: Vec<(String, ConstantBufferMember)>,
    logical_groups: Vec<String>,
}

impl ResourceGroupLayoutBuilder {
    pub fn add_constant_buffer_member(
        mut self,
        name: &str,
        offset: u32,
        size: u32,
    ) -> Self {
        self.constant_buffer_members
            .push((name.to_string(), ConstantBufferMember { offset, size }));
        self
    }

    pub fn add_logical_group(
        mut self,
        name: &str,
    ) -> Self {
        self.logical_groups.push(name.to_string());
        self
    }

    pub fn build(self) -> StrataResult<ResourceGroupLayout> {
        let id = ResourceGroupLayoutId::next();
        let mut constant_buffer_lookup = FnvHashMap::default();
        let mut constant_buffer_size = 0;
        for (name, member) in self.constant_buffer_members {
            let end = member.offset as u64 + member.size as u64;
            if end > i32::MAX as u64 {
                return Err(StrataError::from(format!(
                    "constant buffer member {} at offset {} does not fit in a resource group",
                    name, member.offset
                )));
            }

            log::trace!(
                "  Assign constant buffer member '{}' to offset {} ({} bytes)",
                name,
                member.offset,
                member.size
            );
            constant_buffer_size = constant_buffer_size.max(end as usize);
            if constant_buffer_lookup.insert(name.clone(), member).is_some() {
                return Err(StrataError::from(format!(
                    "constant buffer member {} is declared twice",
                    name
                )));
            }
        }

        let mut logical_group_lookup = FnvHashMap::default();
        for (index, name) in self.logical_groups.into_iter().enumerate() {
            log::trace!("  Assign logical group '{}' to index {}", name, index);
            if logical_group_lookup.insert(name.clone(), index as i32).is_some() {
                return Err(StrataError::from(format!(
                    "logical group {} is declared twice",
                    name
                )));
            }
        }

        Ok(ResourceGroupLayout {
            id,
            constant_buffer_lookup,
            logical_group_lookup,
            constant_buffer_size,
        })
    }

    pub fn build_frame_layout(self) -> StrataResult<FrameResourceGroupLayout> {
        Ok(FrameResourceGroupLayout::new(Arc::new(self.build()?)))
    }

    pub fn build_view_layout(self) -> StrataResult<ViewResourceGroupLayout> {
        Ok(ViewResourceGroupLayout::new(Arc::new(self.build()?)))
    }
}

/// Name to offset/index mapping for one resource group, fixed once built. References obtained
/// from a layout can be cached for as long as the layout lives.
#[derive(Debug)]
pub struct ResourceGroupLayout {
    id: ResourceGroupLayoutId,
    constant_buffer_lookup: FnvHashMap<String, ConstantBufferMember>,
    logical_group_lookup: FnvHashMap<String, i32>,
    constant_buffer_size: usize,
}

impl ResourceGroupLayout {
    pub fn id(&self) -> ResourceGroupLayoutId {
        self.id
    }

    pub fn constant_buffer_size(&self) -> usize {
        self.constant_buffer_size
    }

    pub fn constant_buffer_member(
        &self,
        name: &str,
    ) -> Option<ConstantBufferMember> {
        self.constant_buffer_lookup.get(name).copied()
    }

    pub fn get_constant_buffer_offset(
        &self,
        name: &str,
    ) -> ConstantBufferOffsetReference {
        match self.constant_buffer_lookup.get(name) {
            Some(member) => ConstantBufferOffsetReference {
                offset: member.offset as i32,
                size: member.size,
                #[cfg(debug_assertions)]
                layout_id: self.id,
            },
            None => ConstantBufferOffsetReference::invalid(),
        }
    }

    pub fn get_logical_group_offset(
        &self,
        name: &str,
    ) -> LogicalGroupReference {
        match self.logical_group_lookup.get(name) {
            Some(index) => LogicalGroupReference {
                index: *index,
                #[cfg(debug_assertions)]
                layout_id: self.id,
            },
            None => LogicalGroupReference::invalid(),
        }
    }

    /// `None` for invalid references. Panics in debug builds if the reference came from another
    /// layout.
    #[inline(always)]
    pub fn resolve_constant_buffer_offset(
        &self,
        reference: ConstantBufferOffsetReference,
    ) -> Option<usize> {
        if !reference.is_valid() {
            return None;
        }

        #[cfg(debug_assertions)]
        assert_eq!(
            reference.layout_id, self.id,
            "constant buffer offset reference used with a layout that did not produce it"
        );

        Some(reference.offset as usize)
    }

    #[inline(always)]
    pub fn resolve_logical_group(
        &self,
        reference: LogicalGroupReference,
    ) -> Option<usize> {
        if !reference.is_valid() {
            return None;
        }

        #[cfg(debug_assertions)]
        assert_eq!(
            reference.layout_id, self.id,
            "logical group reference used with a layout that did not produce it"
        );

        Some(reference.index as usize)
    }
}

/// Staging bytes for one resource group instance
#[derive(Clone, Debug)]
pub struct ResourceGroupEntry {
    constant_buffer_data: Vec<u8>,
    last_frame_used: Option<u64>,
}

impl ResourceGroupEntry {
    pub fn new(constant_buffer_size: usize) -> Self {
        ResourceGroupEntry {
            constant_buffer_data: vec![0; constant_buffer_size],
            last_frame_used: None,
        }
    }

    /// Returns `true` the first time it is called for a frame, so the entry is only filled once
    /// per frame no matter how many draws share it
    pub fn mark_as_used(
        &mut self,
        frame_index: u64,
    ) -> bool {
        if self.last_frame_used == Some(frame_index) {
            return false;
        }

        self.last_frame_used = Some(frame_index);
        true
    }

    pub fn constant_buffer_data(&self) -> &[u8] {
        &self.constant_buffer_data
    }

    /// Copies `value` to the referenced offset. Returns `false` (and writes nothing) when the
    /// layout does not declare the member or when `value` is larger than the member.
    pub fn write_constant<T: bytemuck::Pod>(
        &mut self,
        layout: &ResourceGroupLayout,
        reference: ConstantBufferOffsetReference,
        value: &T,
    ) -> bool {
        let offset = match layout.resolve_constant_buffer_offset(reference) {
            Some(offset) => offset,
            None => return false,
        };

        let bytes = bytemuck::bytes_of(value);
        if bytes.len() > reference.size as usize {
            log::warn!(
                "Write of {} bytes at offset {} exceeds the {} byte constant buffer member",
                bytes.len(),
                offset,
                reference.size
            );
            return false;
        }

        match self
            .constant_buffer_data
            .get_mut(offset..offset + bytes.len())
        {
            Some(destination) => {
                destination.copy_from_slice(bytes);
                true
            }
            None => {
                log::warn!(
                    "Write of {} bytes at offset {} overflows a {} byte constant buffer",
                    bytes.len(),
                    offset,
                    self.constant_buffer_data.len()
                );
                false
            }
        }
    }
}

/// A layout for data shared by every view of a frame: exactly one entry
pub struct FrameResourceGroupLayout {
    layout: Arc<ResourceGroupLayout>,
    pub entry: ResourceGroupEntry,
}

impl FrameResourceGroupLayout {
    pub fn new(layout: Arc<ResourceGroupLayout>) -> Self {
        let entry = ResourceGroupEntry::new(layout.constant_buffer_size());
        FrameResourceGroupLayout { layout, entry }
    }

    pub fn layout(&self) -> &Arc<ResourceGroupLayout> {
        &self.layout
    }
}

impl Deref for FrameResourceGroupLayout {
    type Target = ResourceGroupLayout;

    fn deref(&self) -> &Self::Target {
        &self.layout
    }
}

/// A layout for per-view data: one entry per view, grown as views are added
pub struct ViewResourceGroupLayout {
    layout: Arc<ResourceGroupLayout>,
    entries: Vec<ResourceGroupEntry>,
}

impl ViewResourceGroupLayout {
    pub fn new(layout: Arc<ResourceGroupLayout>) -> Self {
        ViewResourceGroupLayout {
            layout,
            entries: Vec::default(),
        }
    }

    pub fn layout(&self) -> &Arc<ResourceGroupLayout> {
        &self.layout
    }

    pub fn ensure_view_count(
        &mut self,
        view_count: usize,
    ) {
        if self.entries.len() < view_count {
            let size = self.layout.constant_buffer_size();
            self.entries
                .resize_with(view_count, || ResourceGroupEntry::new(size));
        }
    }

    pub fn entries(&self) -> &[ResourceGroupEntry] {
        &self.entries
    }

    pub fn entry(
        &self,
        view_index: RenderViewIndex,
    ) -> Option<&ResourceGroupEntry> {
        self.entries.get(view_index as usize)
    }

    pub fn entry_mut(
        &mut self,
        view_index: RenderViewIndex,
    ) -> &mut ResourceGroupEntry {
        self.ensure_view_count(view_index as usize + 1);
        &mut self.entries[view_index as usize]
    }
}

impl Deref for ViewResourceGroupLayout {
    type Target = ResourceGroupLayout;

    fn deref(&self) -> &Self::Target {
        &self.layout
    }
}
