use log::{debug, trace};
use serde::{Deserialize, Serialize};
use crate::block_array::BlockArray;
use crate::data_block::{CellValue, DataBlock};
use crate::error::{Error, Result};
use crate::index_vector::IndexVector;
use crate::layout::{BoxHandle, Layout, LayoutTag};
use crate::message::request::RequestSet;
use crate::message::{Communicator, Tag};
use crate::region::Region;
use crate::traversal::{NeighborIter, PeriodicIter, Periodicity, Trim};

/// Component flags selecting every component.
pub const ALL_COMPONENTS: u32 = u32::MAX;

/// Number of distinct direction codes folded into a message tag.
const TAG_STRIDE: i64 = 27;




/**
 * How posted remote transfers are drained.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitDiscipline {
    /// Unpack each receive as soon as it completes.
    Incremental,
    /// Wait for every transfer to complete, then unpack in item order.
    Barrier,
}

impl Default for WaitDiscipline {
    fn default() -> Self {
        if cfg!(feature = "barrier-wait") {
            WaitDiscipline::Barrier
        } else {
            WaitDiscipline::Incremental
        }
    }
}




/**
 * Whether an exchange pattern has transfers in flight.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Posted,
}




/**
 * Return the message tag for data sent from the box with the given global
 * index, in the given direction. Tags are unique per (box, direction) pair,
 * but may collide with tags of other communication sharing the transport.
 */
pub fn unique_tag<const DIM: usize>(global: i64, dir: IndexVector<DIM>) -> Tag {
    let mut code = 0;
    let mut place = 1;

    for axis in 0..DIM {
        code += place * (dir[axis] + 1);
        place *= 3;
    }
    TAG_STRIDE * global + code
}




/**
 * One directed ghost transfer into a local box, from an adjacent box or a
 * periodic image. `region_recv` is the part of the local box's ghost layer
 * filled by the transfer. `region_send_remote` is the same cells in the
 * remote box's own index space; it differs from `region_recv` only for
 * periodic images. `region_send` is the part of the local box the remote box
 * needs from it in return.
 *
 * The receive flags select which components of the ghost cells an exchange
 * writes, on both the local and the remote path. The send flags are kept
 * for callers that track them, and do not change what goes on the wire.
 */
#[derive(Clone, Debug)]
pub struct Motion<const DIM: usize> {
    local: BoxHandle,
    remote: BoxHandle,
    region_recv: Region<DIM>,
    region_send: Region<DIM>,
    region_send_remote: Region<DIM>,
    send_dir: IndexVector<DIM>,
    local_proc: usize,
    remote_proc: usize,
    tag_send: Tag,
    tag_recv: Tag,
    comp_recv_flags: u32,
    comp_send_flags: u32,
    recv_buffer: Vec<u8>,
    send_buffer: Vec<u8>,
}




// ============================================================================
impl<const DIM: usize> Motion<DIM> {

    #[allow(clippy::too_many_arguments)]
    fn new(
        layout: &Layout<DIM>,
        bytes_per_cell: usize,
        local: BoxHandle,
        remote: BoxHandle,
        region_recv: Region<DIM>,
        region_send: Region<DIM>,
        region_send_remote: Region<DIM>,
        send_dir: IndexVector<DIM>,
    ) -> Self {
        let local_proc = layout.owner(local);
        let remote_proc = layout.owner(remote);
        let is_local = local_proc == remote_proc;

        Self {
            local,
            remote,
            region_recv,
            region_send,
            region_send_remote,
            send_dir,
            local_proc,
            remote_proc,
            tag_send: unique_tag(local.global_index(), send_dir),
            tag_recv: unique_tag(remote.global_index(), -send_dir),
            comp_recv_flags: ALL_COMPONENTS,
            comp_send_flags: ALL_COMPONENTS,
            recv_buffer: if is_local { Vec::new() } else { vec![0; bytes_per_cell * region_recv.size()] },
            send_buffer: if is_local { Vec::new() } else { vec![0; bytes_per_cell * region_send.size()] },
        }
    }

    pub fn is_local(&self) -> bool {
        self.local_proc == self.remote_proc
    }

    pub fn local(&self) -> BoxHandle {
        self.local
    }

    pub fn remote(&self) -> BoxHandle {
        self.remote
    }

    pub fn region_recv(&self) -> Region<DIM> {
        self.region_recv
    }

    pub fn region_send(&self) -> Region<DIM> {
        self.region_send
    }

    pub fn region_send_remote(&self) -> Region<DIM> {
        self.region_send_remote
    }

    /// Offset in the box grid from the local box to the remote box.
    pub fn send_dir(&self) -> IndexVector<DIM> {
        self.send_dir
    }

    /// Offset in the box grid from the remote box to the local box.
    pub fn recv_dir(&self) -> IndexVector<DIM> {
        -self.send_dir
    }

    pub fn local_proc(&self) -> usize {
        self.local_proc
    }

    pub fn remote_proc(&self) -> usize {
        self.remote_proc
    }

    pub fn tag_send(&self) -> Tag {
        self.tag_send
    }

    pub fn tag_recv(&self) -> Tag {
        self.tag_recv
    }

    pub fn comp_recv_flags(&self) -> u32 {
        self.comp_recv_flags
    }

    pub fn comp_send_flags(&self) -> u32 {
        self.comp_send_flags
    }

    pub fn set_comp_recv_flags(&mut self, flags: u32) {
        self.comp_recv_flags = flags
    }

    pub fn set_comp_send_flags(&mut self, flags: u32) {
        self.comp_send_flags = flags
    }

    pub fn recv_buffer(&self) -> &[u8] {
        &self.recv_buffer
    }

    pub fn send_buffer(&self) -> &[u8] {
        &self.send_buffer
    }

    fn receive(&mut self, data: Vec<u8>) -> Result<()> {
        if data.len() != self.recv_buffer.len() {
            return Err(Error::MessageSize {
                tag: self.tag_recv,
                expected: self.recv_buffer.len(),
                received: data.len(),
            });
        }
        self.recv_buffer.copy_from_slice(&data);
        Ok(())
    }
}




/**
 * A precomputed plan for filling the ghost cells of every local box of a
 * layout. Items are created per local box (in traversal order), first for
 * its in-domain neighbors and then for its periodic images. Items between
 * boxes on this process are plain copies; the others are message transfers,
 * and own reusable send and receive buffers.
 *
 * A pattern is bound to the layout it was built from, and to the ghost
 * width, component range, and cell type it was sized for. The same pattern
 * may be used for any number of exchanges on arrays sharing that layout.
 */
#[derive(Debug)]
pub struct ExchangePattern<const DIM: usize> {
    tag: LayoutTag,
    num_ghost: i64,
    start_comp: usize,
    end_comp: usize,
    bytes_per_cell: usize,
    motions: Vec<Motion<DIM>>,
    motion_for_request: Vec<usize>,
    requests: RequestSet,
    wait: WaitDiscipline,
    state: ExchangeState,
}




// ============================================================================
impl<const DIM: usize> ExchangePattern<DIM> {

    /**
     * Build the pattern for exchanging `num_comp` components starting at
     * `start_comp`, on arrays of `T` with `num_ghost` ghost layers. With a
     * ghost width of zero the pattern is empty.
     */
    pub fn new<T: CellValue>(
        layout: &Layout<DIM>,
        num_ghost: i64,
        start_comp: usize,
        num_comp: usize,
        periodic: Periodicity,
        trim: Trim,
    ) -> Self {
        let bytes_per_cell = T::SIZE * num_comp;
        let mut motions = Vec::new();

        if num_ghost > 0 {
            let mut periodic_test = layout.problem_domain();

            for axis in (0..DIM).filter(|axis| periodic.is_periodic(*axis)) {
                periodic_test = periodic_test.grow_dir(-1, axis);
            }
            motions.reserve(layout.local_size() * predicted_num_neighbors(DIM, trim));

            for local in layout.data_iter() {
                let local_box = layout.region(local);
                let grown = local_box.grow(num_ghost);

                for nbr in NeighborIter::new(layout, local, trim) {
                    let remote_box = layout.region(nbr.handle);
                    let recv = grown & remote_box;
                    let send = local_box & remote_box.grow(num_ghost);
                    motions.push(Motion::new(layout, bytes_per_cell, local, nbr.handle, recv, send, recv, nbr.dir));
                }

                if !periodic_test.contains(&local_box) {
                    for image in PeriodicIter::new(layout, local, trim, periodic) {
                        let remote_box = layout.region(image.handle);
                        let shift = local_box.lo() - remote_box.lo() + image.dir * local_box.dimensions();
                        let shifted = remote_box.shift(shift);
                        let recv = grown & shifted;
                        let send = local_box & shifted.grow(num_ghost);
                        let send_remote = recv.shift(-shift);
                        motions.push(Motion::new(layout, bytes_per_cell, local, image.handle, recv, send, send_remote, image.dir));
                    }
                }
            }
        }

        let motion_for_request: Vec<usize> = motions
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.is_local())
            .map(|(i, _)| i)
            .collect();

        debug!(
            "exchange pattern with {} items ({} remote) for {} local boxes, ghost width {}",
            motions.len(),
            motion_for_request.len(),
            layout.local_size(),
            num_ghost
        );

        Self {
            tag: layout.tag(),
            num_ghost,
            start_comp,
            end_comp: start_comp + num_comp,
            bytes_per_cell,
            requests: RequestSet::new(2 * motion_for_request.len()),
            motion_for_request,
            motions,
            wait: WaitDiscipline::default(),
            state: ExchangeState::Idle,
        }
    }


    /**
     * Build the pattern for exchanging every component of an array, with the
     * array's ghost width.
     */
    pub fn for_array<T: CellValue>(array: &BlockArray<T, DIM>, periodic: Periodicity, trim: Trim) -> Self {
        Self::new::<T>(array.layout(), array.nghost(), 0, array.ncomp(), periodic, trim)
    }


    /**
     * Return this pattern, set to drain remote transfers with the given
     * discipline.
     */
    pub fn with_wait(mut self, wait: WaitDiscipline) -> Self {
        self.wait = wait;
        self
    }


    pub fn tag(&self) -> LayoutTag {
        self.tag
    }


    pub fn num_ghost(&self) -> i64 {
        self.num_ghost
    }


    pub fn start_comp(&self) -> usize {
        self.start_comp
    }


    pub fn end_comp(&self) -> usize {
        self.end_comp
    }


    pub fn bytes_per_cell(&self) -> usize {
        self.bytes_per_cell
    }


    pub fn wait_discipline(&self) -> WaitDiscipline {
        self.wait
    }


    pub fn set_wait_discipline(&mut self, wait: WaitDiscipline) {
        debug_assert_eq!(self.state, ExchangeState::Idle);
        self.wait = wait
    }


    pub fn state(&self) -> ExchangeState {
        self.state
    }


    pub fn motions(&self) -> &[Motion<DIM>] {
        &self.motions
    }


    pub fn num_motion_items(&self) -> usize {
        self.motions.len()
    }


    pub fn motion(&self, i: usize) -> &Motion<DIM> {
        &self.motions[i]
    }


    /**
     * Return an item for modification, for example to narrow its component
     * flags.
     */
    pub fn motion_mut(&mut self, i: usize) -> &mut Motion<DIM> {
        &mut self.motions[i]
    }


    /**
     * Return the index of the item served by a request slot.
     */
    pub fn motion_index_for_request(&self, request: usize) -> usize {
        self.motion_for_request[request / 2]
    }


    /**
     * Return the number of request slots: one send and one receive per
     * remote item.
     */
    pub fn num_requests(&self) -> usize {
        self.requests.len()
    }


    pub fn num_remote(&self) -> usize {
        self.motion_for_request.len()
    }


    /**
     * Perform the local copies, and pack and post every remote transfer.
     */
    pub(crate) fn post<T: CellValue>(&mut self, blocks: &mut [DataBlock<T, DIM>], comm: &dyn Communicator) -> Result<()> {
        debug_assert_eq!(self.state, ExchangeState::Idle, "exchange posted twice");
        debug_assert_eq!(self.bytes_per_cell, T::SIZE * (self.end_comp - self.start_comp));

        let (start, end) = (self.start_comp, self.end_comp);
        let mut request = 0;

        for motion in &mut self.motions {
            let dst = motion.local.local_index() as usize;

            if motion.is_local() {
                let src = motion.remote.local_index() as usize;

                if dst == src {
                    blocks[dst].copy_within(
                        &motion.region_recv,
                        &motion.region_send_remote,
                        start,
                        end - start,
                        motion.comp_recv_flags,
                    )
                } else {
                    let (dst_block, src_block) = split_pair(blocks, dst, src);
                    dst_block.copy_from(
                        &motion.region_recv,
                        start,
                        src_block,
                        &motion.region_send_remote,
                        start,
                        end - start,
                        motion.comp_recv_flags,
                    )
                }
            } else {
                blocks[dst].linear_out(&mut motion.send_buffer, &motion.region_send, start, end);
                comm.send(motion.remote_proc, motion.tag_send, &motion.send_buffer)?;
                self.requests.post_send(request);
                self.requests.post_recv(request + 1, motion.remote_proc, motion.tag_recv);
                request += 2;
            }
        }
        trace!("posted {} remote transfers", request / 2);

        self.state = ExchangeState::Posted;
        Ok(())
    }


    /**
     * Wait for every posted transfer to complete, and unpack the receives
     * into the ghost cells.
     */
    pub(crate) fn drain<T: CellValue>(&mut self, blocks: &mut [DataBlock<T, DIM>], comm: &dyn Communicator) -> Result<()> {
        debug_assert_eq!(self.state, ExchangeState::Posted, "exchange drained before it was posted");

        let (start, end) = (self.start_comp, self.end_comp);

        match self.wait {
            WaitDiscipline::Incremental => {
                while let Some(completion) = self.requests.wait_any(comm)? {
                    if let Some(data) = completion.data {
                        let motion = &mut self.motions[self.motion_for_request[completion.index / 2]];
                        motion.receive(data)?;
                        Self::unpack(motion, blocks, start, end);
                    }
                }
            }
            WaitDiscipline::Barrier => {
                for completion in self.requests.wait_all(comm)? {
                    if let Some(data) = completion.data {
                        self.motions[self.motion_for_request[completion.index / 2]].receive(data)?;
                    }
                }
                for &m in &self.motion_for_request {
                    Self::unpack(&self.motions[m], blocks, start, end);
                }
            }
        }
        self.requests.finish(comm)?;
        self.state = ExchangeState::Idle;
        Ok(())
    }


    fn unpack<T: CellValue>(motion: &Motion<DIM>, blocks: &mut [DataBlock<T, DIM>], start: usize, end: usize) {
        let block = &mut blocks[motion.local.local_index() as usize];
        block.linear_in(&motion.recv_buffer, &motion.region_recv, start, end, motion.comp_recv_flags)
    }
}




// ============================================================================
fn split_pair<T>(items: &mut [T], dst: usize, src: usize) -> (&mut T, &T) {
    debug_assert_ne!(dst, src);

    if dst < src {
        let (lo, hi) = items.split_at_mut(src);
        (&mut lo[dst], &hi[0])
    } else {
        let (lo, hi) = items.split_at_mut(dst);
        (&mut hi[0], &lo[src])
    }
}

fn binomial(n: usize, k: usize) -> usize {
    (0..k).fold(1, |acc, i| acc * (n - i) / (i + 1))
}

/**
 * Upper bound on the number of neighbors of a box, not counting periodic
 * images, given the adjacency classes that are trimmed.
 */
fn predicted_num_neighbors(dim: usize, trim: Trim) -> usize {
    (1..=dim)
        .filter(|k| !trim.excludes(*k as i64))
        .map(|k| (1 << k) * binomial(dim, k))
        .sum()
}
