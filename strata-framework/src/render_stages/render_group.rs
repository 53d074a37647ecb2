use bitflags::bitflags;

pub const MAX_RENDER_GROUP_COUNT: u8 = 32;

/// One of 32 groups an object can belong to. Views cull by group and selectors only consider the
/// groups in their mask.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RenderGroup(u8);

impl RenderGroup {
    pub const GROUP0: RenderGroup = RenderGroup(0);
    pub const GROUP1: RenderGroup = RenderGroup(1);
    pub const GROUP2: RenderGroup = RenderGroup(2);
    pub const GROUP3: RenderGroup = RenderGroup(3);

    pub fn new(index: u8) -> Self {
        assert!(
            index < MAX_RENDER_GROUP_COUNT,
            "render group {} is out of range",
            index
        );
        RenderGroup(index)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn mask(self) -> RenderGroupMask {
        RenderGroupMask::from_bits_truncate(1 << self.0)
    }
}

bitflags! {
    #[derive(Default)]
    pub struct RenderGroupMask: u32 {
        const GROUP0 = 1 << 0;
        const GROUP1 = 1 << 1;
        const GROUP2 = 1 << 2;
        const GROUP3 = 1 << 3;
        const GROUP4 = 1 << 4;
        const GROUP5 = 1 << 5;
        const GROUP6 = 1 << 6;
        const GROUP7 = 1 << 7;
        const GROUP8 = 1 << 8;
        const GROUP9 = 1 << 9;
        const GROUP10 = 1 << 10;
        const GROUP11 = 1 << 11;
        const GROUP12 = 1 << 12;
        const GROUP13 = 1 << 13;
        const GROUP14 = 1 << 14;
        const GROUP15 = 1 << 15;
        const GROUP16 = 1 << 16;
        const GROUP17 = 1 << 17;
        const GROUP18 = 1 << 18;
        const GROUP19 = 1 << 19;
        const GROUP20 = 1 << 20;
        const GROUP21 = 1 << 21;
        const GROUP22 = 1 << 22;
        const GROUP23 = 1 << 23;
        const GROUP24 = 1 << 24;
        const GROUP25 = 1 << 25;
        const GROUP26 = 1 << 26;
        const GROUP27 = 1 << 27;
        const GROUP28 = 1 << 28;
        const GROUP29 = 1 << 29;
        const GROUP30 = 1 << 30;
        const GROUP31 = 1 << 31;
        const ALL = 0xFFFF_FFFF;
    }
}

impl RenderGroupMask {
    pub fn contains_group(
        &self,
        render_group: RenderGroup,
    ) -> bool {
        self.intersects(render_group.mask())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_membership() {
        let mask = RenderGroupMask::GROUP0 | RenderGroupMask::GROUP3;
        assert!(mask.contains_group(RenderGroup::GROUP0));
        assert!(!mask.contains_group(RenderGroup::GROUP1));
        assert!(mask.contains_group(RenderGroup::new(3)));
        assert!(RenderGroupMask::ALL.contains_group(RenderGroup::new(31)));
        assert!(!RenderGroupMask::empty().contains_group(RenderGroup::GROUP0));
    }
}
