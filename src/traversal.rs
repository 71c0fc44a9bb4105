use core::ops::BitOr;
use crate::index_vector::IndexVector;
use crate::layout::{BoxHandle, Layout, LayoutTag};
use crate::region::{Region, RegionIter};




/**
 * A set of neighbor adjacency classes to leave out of a neighbor traversal.
 * An offset between two boxes is in class `k` if its 1-norm is `k`: a face
 * neighbor differs on one axis, an edge neighbor on two, and a corner
 * neighbor on three. The center (the box itself) is always left out.
 */
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Trim(u32);

impl Trim {
    pub const NONE: Self = Self(0);
    pub const CENTER: Self = Self(1);
    pub const FACE: Self = Self(2);
    pub const EDGE: Self = Self(4);
    pub const CORNER: Self = Self(8);

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /**
     * Determine whether offsets with the given 1-norm are left out. Classes
     * beyond the width of the mask are never left out.
     */
    pub fn excludes(&self, norm1: i64) -> bool {
        1u32.checked_shl(norm1 as u32)
            .map_or(false, |class| class & (self.0 | Self::CENTER.0) != 0)
    }
}

impl BitOr for Trim {
    type Output = Self;

    fn bitor(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}




/**
 * The set of axes with periodic boundaries. Bits beyond the dimension of a
 * layout are ignored.
 */
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Periodicity(u32);

impl Periodicity {
    pub const NONE: Self = Self(0);
    pub const X: Self = Self(1);
    pub const Y: Self = Self(2);
    pub const Z: Self = Self(4);
    pub const ALL: Self = Self(7);

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /**
     * Build the set from one flag per axis, starting with axis 0.
     */
    pub fn from_axes(axes: &[bool]) -> Self {
        Self(axes.iter().enumerate().filter(|(_, p)| **p).fold(0, |bits, (axis, _)| bits | 1 << axis))
    }

    pub fn is_periodic(&self, axis: usize) -> bool {
        axis < 32 && self.0 & (1 << axis) != 0
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Periodicity {
    type Output = Self;

    fn bitor(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}




/**
 * A restartable, bidirectional traversal over a contiguous range of a
 * layout's boxes, in global index order. Handles yielded for boxes owned by
 * other processes carry a local index relative to this process's first box.
 */
#[derive(Clone, Debug)]
pub struct LayoutIter<'a, const DIM: usize> {
    layout: &'a Layout<DIM>,
    begin: i64,
    current: i64,
    end: i64,
    stop: i64,
}




// ============================================================================
impl<'a, const DIM: usize> LayoutIter<'a, DIM> {

    pub(crate) fn new(layout: &'a Layout<DIM>, begin: usize, end: usize) -> Self {
        Self {
            layout,
            begin: begin as i64,
            current: begin as i64,
            end: end as i64,
            stop: end as i64,
        }
    }


    /**
     * Return the handle at the current position, if the traversal is not
     * exhausted.
     */
    pub fn current(&self) -> Option<BoxHandle> {
        if self.current < self.end {
            Some(self.layout.handle(self.current))
        } else {
            None
        }
    }


    /**
     * Return to the first box of the range, undoing any consumption from
     * either end.
     */
    pub fn reset(&mut self) {
        self.current = self.begin;
        self.end = self.stop;
    }


    /**
     * Move the current position by `delta` boxes, which may be negative. The
     * position is clamped to the range.
     */
    pub fn advance(&mut self, delta: i64) {
        self.current = (self.current + delta).max(self.begin).min(self.end);
    }


    pub fn tag(&self) -> LayoutTag {
        self.layout.tag()
    }


    pub fn layout(&self) -> &'a Layout<DIM> {
        self.layout
    }
}

impl<'a, const DIM: usize> Iterator for LayoutIter<'a, DIM> {
    type Item = BoxHandle;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.current()?;
        self.current += 1;
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.end - self.current).max(0) as usize;
        (n, Some(n))
    }
}

impl<'a, const DIM: usize> DoubleEndedIterator for LayoutIter<'a, DIM> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.current < self.end {
            self.end -= 1;
            Some(self.layout.handle(self.end))
        } else {
            None
        }
    }
}

impl<'a, const DIM: usize> ExactSizeIterator for LayoutIter<'a, DIM> {}

impl<'a, const DIM: usize> PartialEq for LayoutIter<'a, DIM> {
    fn eq(&self, other: &Self) -> bool {
        debug_assert_eq!(self.tag(), other.tag(), "comparing traversals of different layouts");
        self.current == other.current && self.end == other.end
    }
}




/**
 * Traversal over the boxes owned by this process. The handles it yields have
 * local indexes `0, 1, ...`, and can be used to index the blocks of an array
 * defined on the layout.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct DataIter<'a, const DIM: usize> {
    inner: LayoutIter<'a, DIM>,
}




// ============================================================================
impl<'a, const DIM: usize> DataIter<'a, DIM> {

    pub(crate) fn new(layout: &'a Layout<DIM>) -> Self {
        Self {
            inner: LayoutIter::new(layout, layout.local_begin(), layout.local_end()),
        }
    }

    pub fn current(&self) -> Option<BoxHandle> {
        self.inner.current()
    }

    pub fn reset(&mut self) {
        self.inner.reset()
    }

    pub fn advance(&mut self, delta: i64) {
        self.inner.advance(delta)
    }

    pub fn tag(&self) -> LayoutTag {
        self.inner.tag()
    }
}

impl<'a, const DIM: usize> Iterator for DataIter<'a, DIM> {
    type Item = BoxHandle;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, const DIM: usize> DoubleEndedIterator for DataIter<'a, DIM> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<'a, const DIM: usize> ExactSizeIterator for DataIter<'a, DIM> {}




/**
 * A box reached from a base box, and the offset from the base box to it in
 * the grid of boxes. For a periodic image the offset points across the
 * periodic boundary, off the edge of the grid.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Neighbor<const DIM: usize> {
    pub handle: BoxHandle,
    pub dir: IndexVector<DIM>,
}




/**
 * Traversal over the boxes adjacent to a base box (offsets in `[-1, 1]` on
 * every axis) that lie inside the box grid, in raster order of the offset.
 * Offsets whose adjacency class is trimmed are skipped.
 */
#[derive(Clone, Debug)]
pub struct NeighborIter<'a, const DIM: usize> {
    layout: &'a Layout<DIM>,
    base: i64,
    trim: Trim,
    offsets: RegionIter<DIM>,
}




// ============================================================================
impl<'a, const DIM: usize> NeighborIter<'a, DIM> {

    pub fn new(layout: &'a Layout<DIM>, base: BoxHandle, trim: Trim) -> Self {
        Self::with_offsets(layout, base, trim, Region::new(-IndexVector::UNIT, IndexVector::UNIT))
    }

    /**
     * Traverse the boxes reached from the base box by a custom set of
     * offsets, clipped to the box grid.
     */
    pub fn with_offsets(layout: &'a Layout<DIM>, base: BoxHandle, trim: Trim, offsets: Region<DIM>) -> Self {
        let iv_base = layout.grid_coordinate(base.global_index());
        let grid = Region::new(IndexVector::ZERO, layout.dimensions() - 1).shift(-iv_base);

        Self {
            layout,
            base: base.global_index(),
            trim,
            offsets: (offsets & grid).iter(),
        }
    }
}

impl<'a, const DIM: usize> Iterator for NeighborIter<'a, DIM> {
    type Item = Neighbor<DIM>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let dir = self.offsets.next()?;

            if !self.trim.excludes(dir.norm1()) {
                let global = self.base + dir.dot(&self.layout.stride());
                return Some(Neighbor { handle: self.layout.handle(global), dir })
            }
        }
    }
}




/**
 * Traversal over the periodic images of a base box: boxes adjacent to it
 * only across a periodic boundary of the domain. Each item's `dir` is the
 * offset off the edge of the grid; its handle is the box found by wrapping
 * that offset around the periodic axes.
 */
#[derive(Clone, Debug)]
pub struct PeriodicIter<'a, const DIM: usize> {
    layout: &'a Layout<DIM>,
    base: i64,
    trim: Trim,
    periodic: Periodicity,
    grid: Region<DIM>,
    offsets: RegionIter<DIM>,
}




// ============================================================================
impl<'a, const DIM: usize> PeriodicIter<'a, DIM> {

    pub fn new(layout: &'a Layout<DIM>, base: BoxHandle, trim: Trim, periodic: Periodicity) -> Self {
        let iv_base = layout.grid_coordinate(base.global_index());
        let grid = Region::new(IndexVector::ZERO, layout.dimensions() - 1).shift(-iv_base);
        let mut periodic_grid = grid;

        for axis in (0..DIM).filter(|axis| periodic.is_periodic(*axis)) {
            periodic_grid = periodic_grid.grow_dir(1, axis);
        }
        let mut offsets = Region::new(-IndexVector::UNIT, IndexVector::UNIT) & periodic_grid;

        if grid.contains(&offsets) {
            offsets = Region::default();
        }

        Self {
            layout,
            base: base.global_index(),
            trim,
            periodic,
            grid,
            offsets: offsets.iter(),
        }
    }
}

impl<'a, const DIM: usize> Iterator for PeriodicIter<'a, DIM> {
    type Item = Neighbor<DIM>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let dir = self.offsets.next()?;

            if self.trim.excludes(dir.norm1()) || self.grid.contains_point(dir) {
                continue;
            }
            let num_boxes = self.layout.dimensions();
            let mut wrapped = dir;

            for axis in (0..DIM).filter(|axis| self.periodic.is_periodic(*axis)) {
                if dir[axis] < self.grid.lo()[axis] {
                    wrapped[axis] += num_boxes[axis];
                } else if dir[axis] > self.grid.hi()[axis] {
                    wrapped[axis] -= num_boxes[axis];
                }
            }
            let global = self.base + wrapped.dot(&self.layout.stride());
            return Some(Neighbor { handle: self.layout.handle(global), dir })
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{NeighborIter, Periodicity, Trim};
    use crate::index_vector::IndexVector;
    use crate::layout::Layout;
    use crate::message::ChannelCommunicator;
    use crate::region::Region;
    use crate::topology::Topology;

    type IV = IndexVector<3>;

    fn layout(num_boxes: i64) -> Layout<3> {
        let domain = Region::new(IV::ZERO, IV::splat(4 * num_boxes - 1));
        Layout::new(domain, IV::splat(4), &Topology::serial()).unwrap()
    }

    #[test]
    fn trim_classes_work() {
        assert!(Trim::NONE.excludes(0));
        assert!(!Trim::NONE.excludes(1));
        let t = Trim::EDGE | Trim::CORNER;
        assert!(!t.excludes(1));
        assert!(t.excludes(2));
        assert!(t.excludes(3));
        assert_eq!(Periodicity::from_axes(&[true, false, true]), Periodicity::X | Periodicity::Z);
        assert!(!Periodicity::Y.is_periodic(0));
    }

    #[test]
    fn wide_adjacency_classes_are_never_trimmed() {
        assert!(!Trim::CORNER.excludes(32));
        assert!(!Trim::from_bits(u32::MAX).excludes(40));
        assert!(Trim::from_bits(1 << 31).excludes(31));
    }

    #[test]
    fn custom_offsets_are_clipped_to_the_grid() {
        let layout = layout(5);
        let stride = IV::new([1, 5, 25]);
        let wide = Region::new(IV::splat(-2), IV::splat(2));

        let corner: Vec<_> = NeighborIter::with_offsets(&layout, layout.handle(0), Trim::NONE, wide).collect();
        assert_eq!(corner.len(), 26);

        for n in &corner {
            assert!(n.dir.all_le(&IV::splat(2)) && IV::ZERO.all_le(&n.dir));
            assert_eq!(n.handle.global_index(), n.dir.dot(&stride));
            assert_eq!(layout.grid_coordinate(n.handle.global_index()), n.dir);
        }

        let center = layout.handle(62);
        let all: Vec<_> = NeighborIter::with_offsets(&layout, center, Trim::NONE, wide).collect();
        assert_eq!(all.len(), 124);
        assert!(all.iter().all(|n| n.handle.global_index() == 62 + n.dir.dot(&stride)));
    }

    #[test]
    fn custom_offsets_honor_wide_trim_classes() {
        let layout = layout(5);
        let wide = Region::new(IV::splat(-2), IV::splat(2));
        let far = Trim::from_bits((1 << 4) | (1 << 5) | (1 << 6));

        let near: Vec<_> = NeighborIter::with_offsets(&layout, layout.handle(0), far, wide).collect();
        assert_eq!(near.len(), 16);
        assert!(near.iter().all(|n| (1..=3).contains(&n.dir.norm1())));

        let faces_only = Trim::EDGE | Trim::CORNER | far;
        let count = NeighborIter::with_offsets(&layout, layout.handle(0), faces_only, wide).count();
        assert_eq!(count, 3);
    }

    #[test]
    fn offsets_wider_than_the_mask_do_not_overflow() {
        let domain = Region::new(IV::ZERO, IV::splat(11));
        let layout = Layout::new(domain, IV::splat(1), &Topology::serial()).unwrap();
        let offsets = Region::new(IV::splat(-11), IV::splat(11));

        assert_eq!(NeighborIter::with_offsets(&layout, layout.handle(0), Trim::NONE, offsets).count(), 1727);
        assert_eq!(NeighborIter::with_offsets(&layout, layout.handle(0), Trim::CORNER, offsets).count(), 1717);
    }

    #[test]
    fn layout_traversal_works_in_both_directions() {
        let layout = layout(2);
        let forward: Vec<_> = layout.iter().map(|h| h.global_index()).collect();
        let backward: Vec<_> = layout.iter().rev().map(|h| h.global_index()).collect();
        assert_eq!(forward, (0..8).collect::<Vec<_>>());
        assert_eq!(backward, (0..8).rev().collect::<Vec<_>>());
        assert_eq!(layout.iter().len(), 8);
    }

    #[test]
    fn layout_traversal_can_advance_and_reset() {
        let layout = layout(2);
        let mut iter = layout.iter();
        iter.advance(5);
        assert_eq!(iter.current().map(|h| h.global_index()), Some(5));
        iter.advance(-2);
        assert_eq!(iter.next().map(|h| h.global_index()), Some(3));
        iter.advance(100);
        assert_eq!(iter.next(), None);
        iter.reset();
        assert_eq!(iter, layout.iter());
    }

    #[test]
    fn data_traversal_covers_local_boxes() {
        let topologies: Vec<_> = ChannelCommunicator::group(2).into_iter().map(Topology::new).collect();
        let domain = Region::new(IV::ZERO, IV::splat(7));
        let layout = Layout::new(domain, IV::splat(4), &topologies[1]).unwrap();
        let handles: Vec<_> = layout.data_iter().collect();
        assert_eq!(handles.len(), 4);
        assert_eq!(handles[0].global_index(), 4);
        assert_eq!(handles[0].local_index(), 0);
        assert_eq!(handles[3], layout.data_index(3));

        let mut iter = layout.data_iter();
        iter.by_ref().for_each(drop);
        iter.reset();
        assert_eq!(iter.count(), 4);
    }

    #[test]
    fn interior_box_has_26_neighbors() {
        let layout = layout(3);
        let center = layout.handle(13);
        assert_eq!(layout.neighbors(center, Trim::NONE).count(), 26);
        assert_eq!(layout.neighbors(center, Trim::EDGE | Trim::CORNER).count(), 6);
        assert_eq!(layout.neighbors(center, Trim::CORNER).count(), 18);

        for nbr in layout.neighbors(center, Trim::NONE) {
            let expected = layout.grid_coordinate(13) + nbr.dir;
            assert_eq!(layout.grid_coordinate(nbr.handle.global_index()), expected);
        }
    }

    #[test]
    fn corner_box_neighbors_are_clipped() {
        let layout = layout(2);
        let dirs: Vec<_> = layout.neighbors(layout.handle(0), Trim::NONE).map(|n| n.dir).collect();
        assert_eq!(dirs.len(), 7);
        assert_eq!(dirs[0], IV::new([1, 0, 0]));
        assert!(dirs.iter().all(|d| d.all_le(&IV::UNIT) && IV::ZERO.all_le(d)));
    }

    #[test]
    fn periodic_images_wrap_around_the_grid() {
        let layout = layout(2);
        let images: Vec<_> = layout.periodic_images(layout.handle(0), Trim::NONE, Periodicity::X).collect();
        assert_eq!(images.len(), 4);

        for image in &images {
            assert_eq!(image.dir[0], -1);
            let mut expected = image.dir;
            expected[0] += 2;
            assert_eq!(layout.grid_coordinate(image.handle.global_index()), expected);
        }
    }

    #[test]
    fn periodic_images_respect_trim() {
        let layout = layout(2);
        let faces: Vec<_> = layout
            .periodic_images(layout.handle(0), Trim::EDGE | Trim::CORNER, Periodicity::ALL)
            .map(|n| n.dir)
            .collect();
        assert_eq!(faces, vec![IV::new([0, 0, -1]), IV::new([0, -1, 0]), IV::new([-1, 0, 0])]);
        let all = layout.periodic_images(layout.handle(0), Trim::NONE, Periodicity::ALL).count();
        assert_eq!(all + layout.neighbors(layout.handle(0), Trim::NONE).count(), 26);
    }

    #[test]
    fn interior_box_has_no_periodic_images() {
        let layout = layout(3);
        assert_eq!(layout.periodic_images(layout.handle(13), Trim::NONE, Periodicity::ALL).count(), 0);
        assert_eq!(layout.periodic_images(layout.handle(0), Trim::NONE, Periodicity::NONE).count(), 0);
    }

    #[test]
    fn single_box_is_its_own_periodic_image() {
        let layout = layout(1);
        let images: Vec<_> = layout.periodic_images(layout.handle(0), Trim::NONE, Periodicity::X).collect();
        assert_eq!(images.len(), 2);
        assert!(images.iter().all(|n| n.handle == layout.handle(0)));
        assert_eq!(images[0].dir, IV::new([-1, 0, 0]));
        assert_eq!(images[1].dir, IV::new([1, 0, 0]));
    }
}
