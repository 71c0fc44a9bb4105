use std::ops::Index;
use std::sync::Arc;
use log::info;
use crate::error::{Error, Result};
use crate::index_vector::IndexVector;
use crate::region::Region;
use crate::topology::Topology;
use crate::traversal::{DataIter, LayoutIter, NeighborIter, PeriodicIter, Periodicity, Trim};




/**
 * Names one box of a layout by its global index, together with its index
 * among the boxes owned by this process. The local index is only meaningful
 * for boxes owned by this process; for other boxes it is the (possibly
 * negative) distance from the first local box.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoxHandle {
    global: i64,
    local: i64,
}




// ============================================================================
impl BoxHandle {

    /// The handle which refers to no box.
    pub const INVALID: Self = Self { global: -1, local: -1 };

    pub(crate) fn new(global: i64, local: i64) -> Self {
        Self { global, local }
    }

    pub fn global_index(&self) -> i64 {
        self.global
    }

    pub fn local_index(&self) -> i64 {
        self.local
    }

    pub fn is_valid(&self) -> bool {
        self.global >= 0
    }
}

impl Default for BoxHandle {
    fn default() -> Self {
        Self::INVALID
    }
}




/**
 * Identity of a layout's shared box storage. Clones of a layout carry the
 * same tag; a deep copy gets a new one. Objects built against a layout
 * (arrays, exchange patterns) record its tag, so they can be checked for
 * compatibility cheaply.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayoutTag(usize);




#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BoxEntry<const DIM: usize> {
    pub region: Region<DIM>,
    pub owner: usize,
}




/**
 * A partition of a rectangular problem domain into equal, disjoint boxes,
 * laid out as a Cartesian grid and numbered in raster order (axis 0
 * fastest). The boxes are assigned to processes in contiguous blocks of
 * equal length, so process `p` owns global indexes `[p k, (p + 1) k)`.
 *
 * Every process holds the complete list of boxes. A layout is cheap to
 * clone: clones share the list, and with it their identity.
 */
#[derive(Clone, Debug)]
pub struct Layout<const DIM: usize> {
    domain: Region<DIM>,
    num_boxes: IndexVector<DIM>,
    stride: IndexVector<DIM>,
    boxes: Arc<Vec<BoxEntry<DIM>>>,
    local_begin: usize,
    local_count: usize,
    topology: Topology,
}




// ============================================================================
impl<const DIM: usize> Layout<DIM> {

    /**
     * Partition the domain into boxes of `max_box_size` cells on each axis,
     * and distribute them over the processes of the topology. Fails if the
     * box size does not evenly divide the domain on some axis, or if the
     * number of boxes is not a multiple of the number of processes.
     */
    pub fn new(domain: Region<DIM>, max_box_size: IndexVector<DIM>, topology: &Topology) -> Result<Self> {
        let extent = domain.dimensions();

        for axis in 0..DIM {
            if max_box_size[axis] <= 0 {
                return Err(Error::InvalidBoxSize { axis, box_size: max_box_size[axis] });
            }
            if extent[axis] <= 0 {
                return Err(Error::Config(format!("the domain {} is empty", domain)));
            }
            if extent[axis] % max_box_size[axis] != 0 {
                return Err(Error::UnevenDomain {
                    axis,
                    extent: extent[axis],
                    box_size: max_box_size[axis],
                });
            }
        }

        let num_boxes = extent / max_box_size;
        let mut stride = IndexVector::<DIM>::UNIT;

        for axis in 1..DIM {
            stride[axis] = stride[axis - 1] * num_boxes[axis - 1];
        }

        let total = num_boxes.product() as usize;
        let num_procs = topology.size();

        if num_procs == 0 || total % num_procs != 0 {
            return Err(Error::UnevenProcesses { num_boxes: total, num_procs });
        }
        let per_proc = total / num_procs;

        let boxes = (0..total)
            .map(|global| {
                let coord = grid_coordinate(global as i64, stride, num_boxes);
                BoxEntry {
                    region: Region::from_corner(domain.lo() + coord * max_box_size, max_box_size),
                    owner: global / per_proc,
                }
            })
            .collect();

        info!(
            "partitioned {} into {} boxes of size {} ({} per process on {} processes)",
            domain, total, max_box_size, per_proc, num_procs
        );

        Ok(Self {
            domain,
            num_boxes,
            stride,
            boxes: Arc::new(boxes),
            local_begin: topology.rank() * per_proc,
            local_count: per_proc,
            topology: topology.clone(),
        })
    }


    /**
     * Return a copy of this layout with its own box storage, and therefore a
     * distinct tag.
     */
    pub fn deep_copy(&self) -> Self {
        Self {
            boxes: Arc::new(self.boxes.as_ref().clone()),
            ..self.clone()
        }
    }


    pub fn tag(&self) -> LayoutTag {
        LayoutTag(Arc::as_ptr(&self.boxes) as usize)
    }


    pub fn problem_domain(&self) -> Region<DIM> {
        self.domain
    }


    /**
     * Return the number of boxes on each axis of the box grid.
     */
    pub fn dimensions(&self) -> IndexVector<DIM> {
        self.num_boxes
    }


    /**
     * Return the total number of boxes.
     */
    pub fn size(&self) -> usize {
        self.boxes.len()
    }


    /**
     * Return the number of boxes owned by this process.
     */
    pub fn local_size(&self) -> usize {
        self.local_count
    }


    pub fn local_begin(&self) -> usize {
        self.local_begin
    }


    pub fn local_end(&self) -> usize {
        self.local_begin + self.local_count
    }


    pub fn topology(&self) -> &Topology {
        &self.topology
    }


    pub fn region(&self, handle: BoxHandle) -> Region<DIM> {
        self.entry(handle.global).region
    }


    pub fn owner(&self, handle: BoxHandle) -> usize {
        self.entry(handle.global).owner
    }


    pub fn box_and_owner(&self, handle: BoxHandle) -> (Region<DIM>, usize) {
        let entry = self.entry(handle.global);
        (entry.region, entry.owner)
    }


    pub fn is_local(&self, handle: BoxHandle) -> bool {
        self.owner(handle) == self.topology.rank()
    }


    /**
     * Return the handle of the `i`-th box owned by this process.
     */
    pub fn data_index(&self, i: usize) -> BoxHandle {
        debug_assert!(i < self.local_count);
        BoxHandle::new((self.local_begin + i) as i64, i as i64)
    }


    /**
     * Return the handle of a box by its global index. Outside the crate,
     * handles come only from traversals and `data_index`.
     */
    pub(crate) fn handle(&self, global: i64) -> BoxHandle {
        BoxHandle::new(global, global - self.local_begin as i64)
    }


    /**
     * Traverse every box of the layout, in global index order.
     */
    pub fn iter(&self) -> LayoutIter<'_, DIM> {
        LayoutIter::new(self, 0, self.size())
    }


    /**
     * Traverse the boxes owned by this process.
     */
    pub fn data_iter(&self) -> DataIter<'_, DIM> {
        DataIter::new(self)
    }


    /**
     * Traverse the boxes adjacent to the given box which lie inside the
     * domain, with adjacency classes in `trim` excluded.
     */
    pub fn neighbors(&self, handle: BoxHandle, trim: Trim) -> NeighborIter<'_, DIM> {
        NeighborIter::new(self, handle, trim)
    }


    /**
     * Traverse the boxes which are adjacent to the given box only through
     * the periodic boundaries named by `periodic`.
     */
    pub fn periodic_images(&self, handle: BoxHandle, trim: Trim, periodic: Periodicity) -> PeriodicIter<'_, DIM> {
        PeriodicIter::new(self, handle, trim, periodic)
    }


    pub(crate) fn stride(&self) -> IndexVector<DIM> {
        self.stride
    }


    pub(crate) fn grid_coordinate(&self, global: i64) -> IndexVector<DIM> {
        grid_coordinate(global, self.stride, self.num_boxes)
    }


    fn entry(&self, global: i64) -> &BoxEntry<DIM> {
        debug_assert!(global >= 0 && (global as usize) < self.boxes.len());
        &self.boxes[global as usize]
    }
}

impl<const DIM: usize> PartialEq for Layout<DIM> {
    fn eq(&self, other: &Self) -> bool {
        self.tag() == other.tag()
    }
}

impl<const DIM: usize> Index<BoxHandle> for Layout<DIM> {
    type Output = Region<DIM>;

    fn index(&self, handle: BoxHandle) -> &Self::Output {
        &self.entry(handle.global).region
    }
}




// ============================================================================
fn grid_coordinate<const DIM: usize>(global: i64, stride: IndexVector<DIM>, num_boxes: IndexVector<DIM>) -> IndexVector<DIM> {
    let mut coord = IndexVector::<DIM>::ZERO;

    for axis in 0..DIM {
        coord[axis] = (global / stride[axis]) % num_boxes[axis];
    }
    coord
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{BoxHandle, Layout};
    use crate::error::Error;
    use crate::index_vector::IndexVector;
    use crate::message::ChannelCommunicator;
    use crate::region::Region;
    use crate::topology::Topology;

    type IV = IndexVector<3>;

    fn domain() -> Region<3> {
        Region::new(IV::ZERO, IV::splat(9))
    }

    #[test]
    fn serial_layout_has_eight_boxes() {
        let layout = Layout::new(domain(), IV::splat(5), &Topology::serial()).unwrap();
        assert_eq!(layout.size(), 8);
        assert_eq!(layout.local_size(), 8);
        assert_eq!(layout.dimensions(), IV::splat(2));
        assert_eq!(layout.region(layout.handle(0)), Region::new(IV::ZERO, IV::splat(4)));
        assert_eq!(layout.region(layout.handle(1)), Region::new(IV::new([5, 0, 0]), IV::new([9, 4, 4])));
        assert_eq!(layout[layout.handle(7)], Region::new(IV::splat(5), IV::splat(9)));
    }

    #[test]
    fn boxes_tile_the_domain() {
        let layout = Layout::new(domain(), IV::splat(5), &Topology::serial()).unwrap();
        let total: usize = layout.iter().map(|h| layout.region(h).size()).sum();
        assert_eq!(total, domain().size());

        for a in layout.iter() {
            for b in layout.iter() {
                if a != b {
                    assert!((layout[a] & layout[b]).is_empty());
                }
            }
        }
    }

    #[test]
    fn boxes_are_assigned_in_contiguous_blocks() {
        let topologies: Vec<_> = ChannelCommunicator::group(4).into_iter().map(Topology::new).collect();

        for topology in &topologies {
            let layout = Layout::new(domain(), IV::splat(5), topology).unwrap();
            let rank = topology.rank();
            assert_eq!(layout.local_size(), 2);
            assert_eq!(layout.local_begin(), 2 * rank);
            assert_eq!(layout.owner(layout.handle(2 * rank as i64 + 1)), rank);
            assert_eq!(layout.data_index(1).global_index(), 2 * rank as i64 + 1);
            assert_eq!(layout.data_index(1).local_index(), 1);
        }
    }

    #[test]
    fn handles_of_remote_boxes_have_offset_local_index() {
        let topologies: Vec<_> = ChannelCommunicator::group(2).into_iter().map(Topology::new).collect();
        let layout = Layout::new(domain(), IV::splat(5), &topologies[1]).unwrap();
        assert_eq!(layout.handle(0).local_index(), -4);
        assert!(!layout.is_local(layout.handle(0)));
        assert!(layout.is_local(layout.handle(5)));
    }

    #[test]
    fn traversals_produce_the_same_handles_as_global_lookup() {
        let topologies: Vec<_> = ChannelCommunicator::group(2).into_iter().map(Topology::new).collect();
        let layout = Layout::new(domain(), IV::splat(5), &topologies[1]).unwrap();

        for (global, handle) in layout.iter().enumerate() {
            assert_eq!(handle, layout.handle(global as i64));
        }
        for (i, handle) in layout.data_iter().enumerate() {
            assert_eq!(handle, layout.data_index(i));
        }
    }

    #[test]
    fn uneven_partitions_are_rejected() {
        let serial = Topology::serial();
        assert!(matches!(
            Layout::new(domain(), IV::splat(3), &serial),
            Err(Error::UnevenDomain { axis: 0, extent: 10, box_size: 3 })
        ));
        assert!(matches!(
            Layout::new(domain(), IV::new([5, 5, 0]), &serial),
            Err(Error::InvalidBoxSize { axis: 2, .. })
        ));
        let topologies: Vec<_> = ChannelCommunicator::group(3).into_iter().map(Topology::new).collect();
        assert!(matches!(
            Layout::new(domain(), IV::splat(5), &topologies[0]),
            Err(Error::UnevenProcesses { num_boxes: 8, num_procs: 3 })
        ));
    }

    #[test]
    fn clones_share_identity_and_deep_copies_do_not() {
        let layout = Layout::new(domain(), IV::splat(5), &Topology::serial()).unwrap();
        let clone = layout.clone();
        let copy = layout.deep_copy();
        assert_eq!(layout.tag(), clone.tag());
        assert_ne!(layout.tag(), copy.tag());
        assert_eq!(layout[layout.handle(3)], copy[copy.handle(3)]);
    }

    #[test]
    fn invalid_handle_is_the_default() {
        assert_eq!(BoxHandle::default(), BoxHandle::INVALID);
        assert!(!BoxHandle::INVALID.is_valid());
        assert_eq!(BoxHandle::INVALID.local_index(), -1);
    }
}
