use std::marker::PhantomData;

/// A dense integer id that can address an [`IndexVec`]
pub trait Index: Copy + TryFrom<usize> + Into<usize> {}

/// A vector addressed by a typed id instead of a raw `usize`
#[derive(Debug, Clone, PartialEq)]
pub struct IndexVec<T, I>(Vec<T>, PhantomData<I>);

impl<T, I: Index> IndexVec<T, I> {
    pub fn new() -> Self {
        Self(Vec::new(), PhantomData)
    }

    pub fn try_push(&mut self, element: T) -> Result<I, <I as TryFrom<usize>>::Error> {
        let id = I::try_from(self.0.len())?;
        self.0.push(element);
        Ok(id)
    }

    pub fn get(&self, index: I) -> Option<&T> {
        self.0.get(index.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }
}

impl<T, I: Index> std::ops::Index<I> for IndexVec<T, I> {
    type Output = T;

    fn index(&self, index: I) -> &Self::Output {
        &self.0[Into::<usize>::into(index)]
    }
}

impl<T, I> Default for IndexVec<T, I> {
    fn default() -> Self {
        Self(Vec::new(), PhantomData)
    }
}

/// Declares a `Copy` newtype id over an unsigned integer, usable as an [`Index`].
///
/// Ids are ordered and hashable so they can key sorted sets, and print with the given prefix (`bb3`).
#[macro_export]
macro_rules! index_type {
    ($name:ident $repr:ty, $prefix:literal) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub $repr);

        impl TryFrom<usize> for $name {
            type Error = <$repr as TryFrom<usize>>::Error;

            fn try_from(value: usize) -> Result<Self, Self::Error> {
                Ok(Self(<$repr>::try_from(value)?))
            }
        }
        impl From<$name> for usize {
            fn from(v: $name) -> usize {
                v.0 as usize
            }
        }
        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl $crate::indexvec::Index for $name {}
    };
}
