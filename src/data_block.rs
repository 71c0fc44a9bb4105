use crate::index_vector::IndexVector;
use crate::region::Region;




/**
 * A plain numeric value which can be stored in a data block and moved
 * between processes. The wire representation is little-endian and exactly
 * `SIZE` bytes long.
 */
pub trait CellValue: Copy + Default + PartialEq + Send + Sync + 'static {
    const SIZE: usize;

    fn write_le(&self, out: &mut [u8]);

    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_cell_value {
    ($($t:ty),*) => {
        $(
            impl CellValue for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                fn write_le(&self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_le_bytes())
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut buffer = [0; std::mem::size_of::<$t>()];
                    buffer.copy_from_slice(bytes);
                    <$t>::from_le_bytes(buffer)
                }
            }
        )*
    };
}

impl_cell_value!(f32, f64, i8, i16, i32, i64, u8, u16, u32, u64);




/**
 * Determine whether a component is selected by a bit mask of components.
 * Components past the width of the mask are always selected.
 */
pub fn component_enabled(flags: u32, comp: usize) -> bool {
    comp >= 32 || flags & (1 << comp) != 0
}




/**
 * A rectangular block of cell data with a fixed number of components per
 * cell. Storage is one contiguous array, component-major: all cells of
 * component 0 come first, and within a component the cells are in raster
 * order with axis 0 fastest.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct DataBlock<T, const DIM: usize> {
    region: Region<DIM>,
    ncomp: usize,
    data: Vec<T>,
}




// ============================================================================
impl<T: CellValue, const DIM: usize> DataBlock<T, DIM> {


    pub fn new(region: Region<DIM>, ncomp: usize) -> Self {
        Self::from_value(region, ncomp, T::default())
    }


    pub fn from_value(region: Region<DIM>, ncomp: usize, value: T) -> Self {
        Self {
            region,
            ncomp,
            data: vec![value; region.size() * ncomp],
        }
    }


    /**
     * Generate a block with values defined from a closure of the index and
     * the component.
     */
    pub fn from_function<F>(region: Region<DIM>, ncomp: usize, f: F) -> Self
    where
        F: Fn(IndexVector<DIM>, usize) -> T,
    {
        let data = (0..ncomp)
            .flat_map(|comp| region.iter().map(move |index| (index, comp)))
            .map(|(index, comp)| f(index, comp))
            .collect();
        Self { region, ncomp, data }
    }


    pub fn region(&self) -> Region<DIM> {
        self.region
    }


    pub fn ncomp(&self) -> usize {
        self.ncomp
    }


    /**
     * Return the number of values (cells times components).
     */
    pub fn size(&self) -> usize {
        self.data.len()
    }


    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }


    pub fn as_slice(&self) -> &[T] {
        &self.data
    }


    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }


    /**
     * Return the values of one component, in raster order.
     */
    pub fn component(&self, comp: usize) -> &[T] {
        let n = self.region.size();
        &self.data[comp * n..(comp + 1) * n]
    }


    pub fn get(&self, index: IndexVector<DIM>, comp: usize) -> T {
        self.data[self.offset(index, comp)]
    }


    pub fn get_mut(&mut self, index: IndexVector<DIM>, comp: usize) -> &mut T {
        let i = self.offset(index, comp);
        &mut self.data[i]
    }


    pub fn set_val(&mut self, value: T) {
        for x in self.data.iter_mut() {
            *x = value
        }
    }


    pub fn set_comp_val(&mut self, comp: usize, value: T) {
        let n = self.region.size();

        for x in &mut self.data[comp * n..(comp + 1) * n] {
            *x = value
        }
    }


    /**
     * Assign values from a closure over the cells of a subregion.
     */
    pub fn fill_region<F>(&mut self, region: &Region<DIM>, f: F)
    where
        F: Fn(IndexVector<DIM>, usize) -> T,
    {
        debug_assert!(self.region.contains(region));

        for comp in 0..self.ncomp {
            for index in region {
                let i = self.offset(index, comp);
                self.data[i] = f(index, comp)
            }
        }
    }


    /**
     * Copy `num_comp` components from a region of another block into a
     * region of this block. The two regions must have the same shape. Source
     * components start at `src_comp` and destination components at
     * `dst_comp`. Destination components not selected by `flags` are left
     * untouched.
     */
    #[allow(clippy::too_many_arguments)]
    pub fn copy_from(
        &mut self,
        dst_region: &Region<DIM>,
        dst_comp: usize,
        src: &Self,
        src_region: &Region<DIM>,
        src_comp: usize,
        num_comp: usize,
        flags: u32,
    ) {
        debug_assert_eq!(dst_region.dimensions(), src_region.dimensions());
        debug_assert!(self.region.contains(dst_region) && src.region.contains(src_region));

        if dst_region.is_empty() {
            return;
        }
        let run = dst_region.dimensions()[0] as usize;
        let shift = src_region.lo() - dst_region.lo();

        for c in (0..num_comp).filter(|c| component_enabled(flags, dst_comp + c)) {
            for row in dst_region.rows() {
                let d = self.offset(row, dst_comp + c);
                let s = src.offset(row + shift, src_comp + c);
                self.data[d..d + run].copy_from_slice(&src.data[s..s + run]);
            }
        }
    }


    /**
     * Copy between two regions of this block, which may overlap. Used when a
     * box is its own periodic image.
     */
    pub fn copy_within(
        &mut self,
        dst_region: &Region<DIM>,
        src_region: &Region<DIM>,
        start_comp: usize,
        num_comp: usize,
        flags: u32,
    ) {
        debug_assert_eq!(dst_region.dimensions(), src_region.dimensions());

        if dst_region.is_empty() {
            return;
        }
        let run = dst_region.dimensions()[0] as usize;
        let shift = src_region.lo() - dst_region.lo();

        for comp in (start_comp..start_comp + num_comp).filter(|c| component_enabled(flags, *c)) {
            for row in dst_region.rows() {
                let d = self.offset(row, comp);
                let s = self.offset(row + shift, comp);
                self.data.copy_within(s..s + run, d);
            }
        }
    }


    /**
     * Return the number of bytes `linear_out` writes for a region and a
     * number of components.
     */
    pub fn size_bytes(region: &Region<DIM>, num_comp: usize) -> usize {
        region.size() * num_comp * T::SIZE
    }


    /**
     * Serialize components `[start_comp, end_comp)` of a region into a
     * buffer. Cells are written in raster order, with each cell's components
     * contiguous.
     */
    pub fn linear_out(&self, buffer: &mut [u8], region: &Region<DIM>, start_comp: usize, end_comp: usize) {
        debug_assert_eq!(buffer.len(), Self::size_bytes(region, end_comp - start_comp));

        let mut chunks = buffer.chunks_exact_mut(T::SIZE);

        for index in region {
            for comp in start_comp..end_comp {
                if let Some(chunk) = chunks.next() {
                    self.get(index, comp).write_le(chunk)
                }
            }
        }
    }


    /**
     * Deserialize components `[start_comp, end_comp)` of a region from a
     * buffer written by `linear_out`. Components not selected by `flags` are
     * left untouched.
     */
    pub fn linear_in(&mut self, buffer: &[u8], region: &Region<DIM>, start_comp: usize, end_comp: usize, flags: u32) {
        debug_assert_eq!(buffer.len(), Self::size_bytes(region, end_comp - start_comp));

        let mut chunks = buffer.chunks_exact(T::SIZE);

        for index in region {
            for comp in start_comp..end_comp {
                if let Some(chunk) = chunks.next() {
                    if component_enabled(flags, comp) {
                        *self.get_mut(index, comp) = T::read_le(chunk)
                    }
                }
            }
        }
    }


    /**
     * Return the position of a cell's component in the storage array.
     */
    pub fn offset(&self, index: IndexVector<DIM>, comp: usize) -> usize {
        debug_assert!(self.region.contains_point(index), "index {} out of block {}", index, self.region);
        debug_assert!(comp < self.ncomp);
        comp * self.region.size() + self.region.offset(index)
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{CellValue, DataBlock};
    use crate::index_vector::IndexVector;
    use crate::region::Region;

    type IV = IndexVector<3>;

    fn ramp(region: Region<3>, ncomp: usize) -> DataBlock<f64, 3> {
        DataBlock::from_function(region, ncomp, |i, c| (i[0] + 10 * i[1] + 100 * i[2]) as f64 + 0.5 * c as f64)
    }

    #[test]
    fn storage_is_component_major_with_axis_zero_fastest() {
        let block = ramp(Region::new(IV::ZERO, IV::new([1, 1, 0])), 2);
        assert_eq!(block.as_slice(), &[0.0, 1.0, 10.0, 11.0, 0.5, 1.5, 10.5, 11.5]);
        assert_eq!(block.component(1), &[0.5, 1.5, 10.5, 11.5]);
        assert_eq!(block.get(IV::new([1, 1, 0]), 1), 11.5);
    }

    #[test]
    fn set_val_works() {
        let mut block = DataBlock::<i32, 2>::new(Region::new(IndexVector::ZERO, IndexVector::splat(2)), 3);
        block.set_val(4);
        block.set_comp_val(1, -1);
        assert!(block.component(0).iter().all(|x| *x == 4));
        assert!(block.component(1).iter().all(|x| *x == -1));
        assert!(block.component(2).iter().all(|x| *x == 4));
    }

    #[test]
    fn copy_between_blocks_maps_regions_by_shape() {
        let src = ramp(Region::new(IV::ZERO, IV::splat(3)), 2);
        let mut dst = DataBlock::<f64, 3>::from_value(Region::new(IV::splat(10), IV::splat(13)), 2, -1.0);
        let dst_region = Region::new(IV::splat(10), IV::new([11, 12, 10]));
        let src_region = dst_region.shift(IV::new([-9, -10, -8]));

        dst.copy_from(&dst_region, 0, &src, &src_region, 0, 2, u32::MAX);

        for index in &dst_region {
            let s = index + IV::new([-9, -10, -8]);
            assert_eq!(dst.get(index, 0), src.get(s, 0));
            assert_eq!(dst.get(index, 1), src.get(s, 1));
        }
        assert_eq!(dst.get(IV::splat(13), 0), -1.0);
    }

    #[test]
    fn copy_honors_component_flags() {
        let src = ramp(Region::new(IV::ZERO, IV::splat(1)), 3);
        let mut dst = DataBlock::<f64, 3>::new(src.region(), 3);
        let r = src.region();
        dst.copy_from(&r, 0, &src, &r, 0, 3, 0b101);
        assert_eq!(dst.component(0), src.component(0));
        assert!(dst.component(1).iter().all(|x| *x == 0.0));
        assert_eq!(dst.component(2), src.component(2));
    }

    #[test]
    fn copy_within_a_block_works() {
        let mut block = ramp(Region::new(IV::ZERO, IV::new([5, 1, 1])), 1);
        let original = block.clone();
        let dst = Region::new(IV::ZERO, IV::new([0, 1, 1]));
        let src = Region::new(IV::new([4, 0, 0]), IV::new([4, 1, 1]));
        block.copy_within(&dst, &src, 0, 1, u32::MAX);

        for index in &dst {
            assert_eq!(block.get(index, 0), original.get(index + IV::new([4, 0, 0]), 0));
        }
        assert_eq!(block.get(IV::new([1, 0, 0]), 0), original.get(IV::new([1, 0, 0]), 0));
    }

    #[test]
    fn packed_cells_keep_components_together() {
        let block = ramp(Region::new(IV::ZERO, IV::splat(2)), 3);
        let region = Region::new(IV::new([1, 1, 1]), IV::new([2, 1, 1]));
        let mut buffer = vec![0; DataBlock::<f64, 3>::size_bytes(&region, 2)];
        block.linear_out(&mut buffer, &region, 1, 3);

        let values: Vec<f64> = buffer.chunks(8).map(f64::read_le).collect();
        assert_eq!(values, vec![111.5, 112.0, 112.5, 113.0]);

        let mut other = DataBlock::<f64, 3>::new(block.region(), 3);
        other.linear_in(&buffer, &region, 1, 3, u32::MAX);
        assert_eq!(other.get(IV::new([2, 1, 1]), 2), 113.0);
        assert_eq!(other.get(IV::new([2, 1, 1]), 0), 0.0);
    }

    #[test]
    fn unpacking_honors_component_flags() {
        let block = ramp(Region::new(IV::ZERO, IV::splat(1)), 2);
        let region = block.region();
        let mut buffer = vec![0; DataBlock::<f64, 3>::size_bytes(&region, 2)];
        block.linear_out(&mut buffer, &region, 0, 2);

        let mut other = DataBlock::<f64, 3>::from_value(region, 2, 7.0);
        other.linear_in(&buffer, &region, 0, 2, 0b10);
        assert!(other.component(0).iter().all(|x| *x == 7.0));
        assert_eq!(other.component(1), block.component(1));
    }
}
