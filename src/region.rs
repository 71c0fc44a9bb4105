use core::fmt;
use core::ops::BitAnd;
use crate::index_vector::IndexVector;




/**
 * Identifier for one side of a region along an axis
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Lo,
    Hi,
}




/**
 * Represents a rectangular region in a discrete index space. Bounds are
 * inclusive on both ends: the region `[lo, hi]` contains every index `i` with
 * `lo[d] <= i[d] <= hi[d]` on each axis. A region is empty if `hi[d] < lo[d]`
 * on any axis. Regions are values and are copied freely.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region<const DIM: usize> {
    lo: IndexVector<DIM>,
    hi: IndexVector<DIM>,
}




// ============================================================================
impl<const DIM: usize> Region<DIM> {


    pub fn new(lo: IndexVector<DIM>, hi: IndexVector<DIM>) -> Self {
        Self { lo, hi }
    }


    /**
     * Return a region with the given lower corner and number of cells on each
     * axis.
     */
    pub fn from_corner(lo: IndexVector<DIM>, dimensions: IndexVector<DIM>) -> Self {
        Self { lo, hi: lo + dimensions - 1 }
    }


    /**
     * Return the minimum index (inclusive).
     */
    pub fn lo(&self) -> IndexVector<DIM> {
        self.lo
    }


    /**
     * Return the maximum index (inclusive).
     */
    pub fn hi(&self) -> IndexVector<DIM> {
        self.hi
    }


    pub fn is_empty(&self) -> bool {
        (0..DIM).any(|d| self.hi[d] < self.lo[d])
    }


    /**
     * Return the number of indexes on each axis. Meaningless for an empty
     * region.
     */
    pub fn dimensions(&self) -> IndexVector<DIM> {
        self.hi - self.lo + 1
    }


    /**
     * Return the number of cells in this region, zero if it is empty.
     */
    pub fn size(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.dimensions().product() as usize
        }
    }


    /**
     * Determine whether this region contains the given index.
     */
    pub fn contains_point(&self, index: IndexVector<DIM>) -> bool {
        self.lo.all_le(&index) && index.all_le(&self.hi)
    }


    /**
     * Determine whether another region is a subset of this one. The empty
     * region is a subset of every region.
     */
    pub fn contains(&self, other: &Self) -> bool {
        other.is_empty() || (self.lo.all_le(&other.lo) && other.hi.all_le(&self.hi))
    }


    /**
     * Return the intersection of two regions, which may be empty.
     */
    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            lo: self.lo.max(other.lo),
            hi: self.hi.min(other.hi),
        }
    }


    /**
     * Expand this region by the given number of cells on each side of every
     * axis. A negative amount shrinks it.
     */
    pub fn grow(&self, delta: i64) -> Self {
        Self {
            lo: self.lo - delta,
            hi: self.hi + delta,
        }
    }


    /**
     * Expand this region by the given number of cells on both sides of one
     * axis.
     */
    pub fn grow_dir(&self, delta: i64, axis: usize) -> Self {
        self.grow_lo(delta, axis).grow_hi(delta, axis)
    }


    /**
     * Expand just the lower side of this region on the given axis.
     */
    pub fn grow_lo(&self, delta: i64, axis: usize) -> Self {
        let mut result = *self;
        result.lo[axis] -= delta;
        result
    }


    /**
     * Expand just the upper side of this region on the given axis.
     */
    pub fn grow_hi(&self, delta: i64, axis: usize) -> Self {
        let mut result = *self;
        result.hi[axis] += delta;
        result
    }


    /**
     * Expand the upper side of this region on every axis.
     */
    pub fn grow_hi_all(&self, delta: i64) -> Self {
        Self {
            lo: self.lo,
            hi: self.hi + delta,
        }
    }


    pub fn shift(&self, by: IndexVector<DIM>) -> Self {
        Self {
            lo: self.lo + by,
            hi: self.hi + by,
        }
    }


    pub fn shift_dir(&self, delta: i64, axis: usize) -> Self {
        self.shift(IndexVector::basis(axis) * delta)
    }


    /**
     * Return the slab of `n` cells adjacent to this region on the given side
     * of an axis. If `n` is negative, the slab is instead the `-n` cells just
     * inside that side of this region.
     */
    pub fn adj_box(&self, n: i64, axis: usize, side: Side) -> Self {
        let mut result = *self;

        match side {
            Side::Lo => {
                if n > 0 {
                    result.hi[axis] = self.lo[axis] - 1;
                    result.lo[axis] = self.lo[axis] - n;
                } else {
                    result.hi[axis] = self.lo[axis] - n - 1;
                }
            }
            Side::Hi => {
                if n > 0 {
                    result.lo[axis] = self.hi[axis] + 1;
                    result.hi[axis] = self.hi[axis] + n;
                } else {
                    result.lo[axis] = self.hi[axis] + n + 1;
                }
            }
        }
        result
    }


    /**
     * Return the linear offset of the given index in a buffer laid out over
     * this region, with axis 0 increasing fastest.
     */
    pub fn offset(&self, index: IndexVector<DIM>) -> usize {
        let dims = self.dimensions();
        let mut offset = 0;
        let mut stride = 1;

        for d in 0..DIM {
            offset += (index[d] - self.lo[d]) * stride;
            stride *= dims[d];
        }
        offset as usize
    }


    /**
     * Return an iterator which traverses the region in raster order (axis 0
     * increases fastest, then axis 1, then axis 2).
     */
    pub fn iter(&self) -> RegionIter<DIM> {
        RegionIter {
            region: *self,
            current: if self.is_empty() { None } else { Some(self.lo) },
        }
    }


    /**
     * Return an iterator over the first index of each contiguous run of cells
     * along axis 0, in raster order. Each run has `dimensions()[0]` cells.
     */
    pub fn rows(&self) -> RegionIter<DIM> {
        let mut collapsed = *self;
        collapsed.hi[0] = collapsed.lo[0];
        collapsed.iter()
    }
}




// ============================================================================
impl<const DIM: usize> Default for Region<DIM> {
    fn default() -> Self {
        Self {
            lo: IndexVector::ZERO,
            hi: IndexVector::splat(-1),
        }
    }
}

impl<const DIM: usize> BitAnd for Region<DIM> {
    type Output = Self;

    fn bitand(self, other: Self) -> Self {
        self.intersect(&other)
    }
}

impl<const DIM: usize> fmt::Display for Region<DIM> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}]", self.lo, self.hi)
    }
}

impl<'a, const DIM: usize> IntoIterator for &'a Region<DIM> {
    type Item = IndexVector<DIM>;
    type IntoIter = RegionIter<DIM>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}




/**
 * Raster-order iterator over the indexes in a region
 */
#[derive(Clone, Debug)]
pub struct RegionIter<const DIM: usize> {
    region: Region<DIM>,
    current: Option<IndexVector<DIM>>,
}




// ============================================================================
impl<const DIM: usize> Iterator for RegionIter<DIM> {
    type Item = IndexVector<DIM>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.current?;
        let mut next = result;

        self.current = None;

        for d in 0..DIM {
            if next[d] < self.region.hi[d] {
                next[d] += 1;
                self.current = Some(next);
                break;
            }
            next[d] = self.region.lo[d];
        }
        Some(result)
    }
}
