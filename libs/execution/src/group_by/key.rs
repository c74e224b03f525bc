use std::fmt::{self, Display, Formatter};

use quarry_array::Scalar;
use smallvec::SmallVec;

/// Decoded values of the group-by columns of one group, in column order.
#[derive(Debug, Default, Clone, Eq, PartialEq, Hash)]
pub struct GroupKey(SmallVec<[Scalar; 4]>);

impl GroupKey {
    #[inline]
    pub fn values(&self) -> &[Scalar] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<Scalar> {
        self.0.into_vec()
    }
}

impl From<Vec<Scalar>> for GroupKey {
    fn from(values: Vec<Scalar>) -> Self {
        GroupKey(SmallVec::from_vec(values))
    }
}

impl std::iter::FromIterator<Scalar> for GroupKey {
    fn from_iter<T: IntoIterator<Item = Scalar>>(iter: T) -> Self {
        GroupKey(iter.into_iter().collect())
    }
}

impl Display for GroupKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, value) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", value)?;
        }
        f.write_str("]")
    }
}
