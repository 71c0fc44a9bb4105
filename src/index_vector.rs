use core::fmt;
use core::ops::{Add, Div, Index, IndexMut, Mul, Neg, Sub};




/**
 * A statically-sized integer coordinate in a `DIM`-dimensional index space.
 * `DIM` is fixed at compile time and is expected to be 2 or 3. Index vectors
 * are plain values with no identity beyond their components.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IndexVector<const DIM: usize> {
    data: [i64; DIM],
}




// ============================================================================
impl<const DIM: usize> IndexVector<DIM> {

    /// All components zero.
    pub const ZERO: Self = Self { data: [0; DIM] };

    /// All components one.
    pub const UNIT: Self = Self { data: [1; DIM] };


    pub const fn new(data: [i64; DIM]) -> Self {
        Self { data }
    }


    /**
     * Return a vector with every component equal to `value`.
     */
    pub const fn splat(value: i64) -> Self {
        Self { data: [value; DIM] }
    }


    /**
     * Return the unit vector along the given axis.
     */
    pub fn basis(axis: usize) -> Self {
        let mut result = Self::ZERO;
        result[axis] = 1;
        result
    }


    pub fn as_array(&self) -> &[i64; DIM] {
        &self.data
    }


    /**
     * Component-wise minimum.
     */
    pub fn min(self, other: Self) -> Self {
        self.zip_with(other, i64::min)
    }


    /**
     * Component-wise maximum.
     */
    pub fn max(self, other: Self) -> Self {
        self.zip_with(other, i64::max)
    }


    /**
     * Sum of the absolute values of the components. For an offset between
     * neighboring boxes this is the adjacency class: 1 for a face, 2 for an
     * edge and 3 for a corner.
     */
    pub fn norm1(&self) -> i64 {
        self.data.iter().map(|x| x.abs()).sum()
    }


    pub fn sum(&self) -> i64 {
        self.data.iter().sum()
    }


    pub fn product(&self) -> i64 {
        self.data.iter().product()
    }


    /**
     * Determine whether every component of this vector is strictly less than
     * the corresponding component of another.
     */
    pub fn all_lt(&self, other: &Self) -> bool {
        self.data.iter().zip(other.data.iter()).all(|(a, b)| a < b)
    }


    /**
     * Determine whether every component of this vector is less than or equal
     * to the corresponding component of another.
     */
    pub fn all_le(&self, other: &Self) -> bool {
        self.data.iter().zip(other.data.iter()).all(|(a, b)| a <= b)
    }


    /**
     * Dot product with another vector. Used to turn an offset in the box
     * grid into a linear offset with the grid strides.
     */
    pub fn dot(&self, other: &Self) -> i64 {
        self.data.iter().zip(other.data.iter()).map(|(a, b)| a * b).sum()
    }


    fn zip_with<F: Fn(i64, i64) -> i64>(self, other: Self, f: F) -> Self {
        let mut data = [0; DIM];

        for (i, x) in data.iter_mut().enumerate() {
            *x = f(self.data[i], other.data[i])
        }
        Self { data }
    }


    fn map<F: Fn(i64) -> i64>(self, f: F) -> Self {
        let mut data = self.data;

        for x in data.iter_mut() {
            *x = f(*x)
        }
        Self { data }
    }
}




// ============================================================================
impl<const DIM: usize> Default for IndexVector<DIM> {
    fn default() -> Self {
        Self::ZERO
    }
}

impl<const DIM: usize> From<[i64; DIM]> for IndexVector<DIM> {
    fn from(data: [i64; DIM]) -> Self {
        Self { data }
    }
}

impl<const DIM: usize> fmt::Display for IndexVector<DIM> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, x) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", x)?;
        }
        write!(f, ")")
    }
}




// ============================================================================
impl<const DIM: usize> Add for IndexVector<DIM> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.zip_with(other, |a, b| a + b)
    }
}

impl<const DIM: usize> Sub for IndexVector<DIM> {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self.zip_with(other, |a, b| a - b)
    }
}

impl<const DIM: usize> Mul for IndexVector<DIM> {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        self.zip_with(other, |a, b| a * b)
    }
}

impl<const DIM: usize> Div for IndexVector<DIM> {
    type Output = Self;

    fn div(self, other: Self) -> Self {
        self.zip_with(other, |a, b| a / b)
    }
}

impl<const DIM: usize> Add<i64> for IndexVector<DIM> {
    type Output = Self;

    fn add(self, other: i64) -> Self {
        self.map(|a| a + other)
    }
}

impl<const DIM: usize> Sub<i64> for IndexVector<DIM> {
    type Output = Self;

    fn sub(self, other: i64) -> Self {
        self.map(|a| a - other)
    }
}

impl<const DIM: usize> Mul<i64> for IndexVector<DIM> {
    type Output = Self;

    fn mul(self, other: i64) -> Self {
        self.map(|a| a * other)
    }
}

impl<const DIM: usize> Mul<IndexVector<DIM>> for i64 {
    type Output = IndexVector<DIM>;

    fn mul(self, other: IndexVector<DIM>) -> IndexVector<DIM> {
        other * self
    }
}

impl<const DIM: usize> Neg for IndexVector<DIM> {
    type Output = Self;

    fn neg(self) -> Self {
        self.map(|a| -a)
    }
}




// ============================================================================
impl<const DIM: usize> Index<usize> for IndexVector<DIM> {
    type Output = i64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.data[index]
    }
}

impl<const DIM: usize> IndexMut<usize> for IndexVector<DIM> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.data[index]
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::IndexVector;

    type IV = IndexVector<3>;

    #[test]
    fn arithmetic_works_component_wise() {
        let a = IV::new([1, 2, 3]);
        let b = IV::new([4, 5, 6]);
        assert_eq!(a + b, IV::new([5, 7, 9]));
        assert_eq!(b - a, IV::splat(3));
        assert_eq!(a * b, IV::new([4, 10, 18]));
        assert_eq!(b / a, IV::new([4, 2, 2]));
        assert_eq!(2 * a, IV::new([2, 4, 6]));
        assert_eq!(-a, IV::new([-1, -2, -3]));
        assert_eq!(a + 1, IV::new([2, 3, 4]));
    }

    #[test]
    fn min_max_and_norms_work() {
        let a = IV::new([-1, 5, 0]);
        let b = IV::new([2, -3, 0]);
        assert_eq!(a.min(b), IV::new([-1, -3, 0]));
        assert_eq!(a.max(b), IV::new([2, 5, 0]));
        assert_eq!(a.norm1(), 6);
        assert_eq!(a.sum(), 4);
        assert_eq!(IV::new([2, 3, 4]).product(), 24);
        assert_eq!(IV::ZERO.norm1(), 0);
        assert_eq!(IV::UNIT.product(), 1);
    }

    #[test]
    fn comparisons_require_all_components() {
        let a = IV::new([0, 0, 0]);
        let b = IV::new([1, 1, 0]);
        assert!(!a.all_lt(&b));
        assert!(a.all_le(&b));
        assert!(a.all_lt(&IV::UNIT));
    }

    #[test]
    fn display_lists_components() {
        assert_eq!(IndexVector::<2>::new([3, -4]).to_string(), "(3,-4)");
    }
}
