use std::fmt::{Display, Formatter};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name: ident, $type: ty) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
        pub struct $name($type);

        impl $name {
            #[inline]
            pub fn new(value: $type) -> Self {
                Self(value)
            }

            #[inline]
            pub fn as_num(&self) -> $type {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Identifies a submitted task. Assigned in submission order, starting at zero.
    TaskId,
    u64
);
numeric_id!(
    /// Index of a worker slot within its cluster.
    WorkerId,
    u32
);
