mod resource_group_layout;
pub use resource_group_layout::ConstantBufferMember;
pub use resource_group_layout::ConstantBufferOffsetReference;
pub use resource_group_layout::FrameResourceGroupLayout;
pub use resource_group_layout::LogicalGroupReference;
pub use resource_group_layout::ResourceGroupEntry;
pub use resource_group_layout::ResourceGroupLayout;
pub use resource_group_layout::ResourceGroupLayoutBuilder;
pub use resource_group_layout::ResourceGroupLayoutId;
pub use resource_group_layout::ViewResourceGroupLayout;
