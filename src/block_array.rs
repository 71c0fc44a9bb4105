use std::ops::{Index, IndexMut};
use log::debug;
use rayon::prelude::*;
use crate::data_block::{CellValue, DataBlock};
use crate::error::Result;
use crate::exchange::ExchangePattern;
use crate::index_vector::IndexVector;
use crate::layout::{BoxHandle, Layout, LayoutTag};




/**
 * A field distributed over the boxes of a layout. The array holds one data
 * block per box owned by this process, indexed by local index. Each block
 * covers its box grown by the ghost width on every side, with `ncomp`
 * components per cell. Ghost cells are filled from neighboring boxes by an
 * exchange.
 */
#[derive(Clone, Debug)]
pub struct BlockArray<T, const DIM: usize> {
    layout: Layout<DIM>,
    ncomp: usize,
    nghost: i64,
    blocks: Vec<DataBlock<T, DIM>>,
}




// ============================================================================
impl<T: CellValue, const DIM: usize> BlockArray<T, DIM> {


    pub fn new(layout: &Layout<DIM>, ncomp: usize, nghost: i64) -> Self {
        let blocks = layout
            .data_iter()
            .map(|handle| DataBlock::new(layout.region(handle).grow(nghost), ncomp))
            .collect();

        Self {
            layout: layout.clone(),
            ncomp,
            nghost,
            blocks,
        }
    }


    /**
     * Discard the current blocks and reallocate for a new layout, component
     * count, and ghost width.
     */
    pub fn define(&mut self, layout: &Layout<DIM>, ncomp: usize, nghost: i64) {
        *self = Self::new(layout, ncomp, nghost)
    }


    pub fn layout(&self) -> &Layout<DIM> {
        &self.layout
    }


    pub fn tag(&self) -> LayoutTag {
        self.layout.tag()
    }


    /**
     * Return the number of local blocks.
     */
    pub fn size(&self) -> usize {
        self.blocks.len()
    }


    pub fn ncomp(&self) -> usize {
        self.ncomp
    }


    pub fn nghost(&self) -> i64 {
        self.nghost
    }


    pub fn block(&self, handle: BoxHandle) -> &DataBlock<T, DIM> {
        &self.blocks[self.block_index(handle)]
    }


    pub fn block_mut(&mut self, handle: BoxHandle) -> &mut DataBlock<T, DIM> {
        let i = self.block_index(handle);
        &mut self.blocks[i]
    }


    /**
     * Return a block by its local index.
     */
    pub fn get_linear(&self, i: usize) -> &DataBlock<T, DIM> {
        &self.blocks[i]
    }


    pub fn get_linear_mut(&mut self, i: usize) -> &mut DataBlock<T, DIM> {
        &mut self.blocks[i]
    }


    /**
     * Traverse the local blocks together with their handles.
     */
    pub fn iter(&self) -> impl Iterator<Item = (BoxHandle, &DataBlock<T, DIM>)> + '_ {
        self.layout.data_iter().zip(self.blocks.iter())
    }


    pub fn iter_mut(&mut self) -> impl Iterator<Item = (BoxHandle, &mut DataBlock<T, DIM>)> + '_ {
        self.layout.data_iter().zip(self.blocks.iter_mut())
    }


    pub fn set_val(&mut self, value: T) {
        self.blocks.par_iter_mut().for_each(|block| block.set_val(value))
    }


    pub fn set_comp_val(&mut self, comp: usize, value: T) {
        self.blocks.par_iter_mut().for_each(|block| block.set_comp_val(comp, value))
    }


    /**
     * Assign every interior cell (ghost cells excluded) from a function of
     * its global index and component. Blocks are filled in parallel.
     */
    pub fn fill_with<F>(&mut self, f: F)
    where
        F: Fn(IndexVector<DIM>, usize) -> T + Sync,
    {
        let layout = &self.layout;

        self.blocks
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, block)| block.fill_region(&layout.region(layout.data_index(i)), &f))
    }


    /**
     * Fill the ghost cells of every local block from the neighboring boxes,
     * as planned by the pattern. Returns when all transfers are complete.
     */
    pub fn exchange(&mut self, pattern: &mut ExchangePattern<DIM>) -> Result<()> {
        self.exchange_begin(pattern)?;
        self.exchange_end(pattern)
    }


    /**
     * Perform the local copies of an exchange and post its remote transfers.
     * Must be followed by `exchange_end` with the same pattern before the
     * ghost cells are read or the pattern is used again.
     */
    pub fn exchange_begin(&mut self, pattern: &mut ExchangePattern<DIM>) -> Result<()> {
        debug_assert_eq!(pattern.tag(), self.tag(), "exchange pattern built for another layout");
        debug_assert!(pattern.end_comp() <= self.ncomp);
        debug_assert!(pattern.num_ghost() <= self.nghost);

        if self.nghost == 0 {
            return Ok(());
        }
        debug!("exchange begin: {} items", pattern.num_motion_items());
        pattern.post(&mut self.blocks, self.layout.topology().comm())
    }


    /**
     * Wait for the transfers posted by `exchange_begin` and unpack them into
     * the ghost cells.
     */
    pub fn exchange_end(&mut self, pattern: &mut ExchangePattern<DIM>) -> Result<()> {
        debug_assert_eq!(pattern.tag(), self.tag(), "exchange pattern built for another layout");

        if self.nghost == 0 {
            return Ok(());
        }
        pattern.drain(&mut self.blocks, self.layout.topology().comm())?;
        debug!("exchange end: {} requests drained", pattern.num_requests());
        Ok(())
    }


    fn block_index(&self, handle: BoxHandle) -> usize {
        debug_assert!(handle.local_index() >= 0 && (handle.local_index() as usize) < self.blocks.len());
        debug_assert!(
            (self.layout.local_begin()..self.layout.local_end()).contains(&(handle.global_index() as usize)),
            "box {} is not owned by this process",
            handle.global_index()
        );
        handle.local_index() as usize
    }
}

impl<T: CellValue, const DIM: usize> Index<BoxHandle> for BlockArray<T, DIM> {
    type Output = DataBlock<T, DIM>;

    fn index(&self, handle: BoxHandle) -> &Self::Output {
        self.block(handle)
    }
}

impl<T: CellValue, const DIM: usize> IndexMut<BoxHandle> for BlockArray<T, DIM> {
    fn index_mut(&mut self, handle: BoxHandle) -> &mut Self::Output {
        self.block_mut(handle)
    }
}
