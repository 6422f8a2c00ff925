use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl $name {
            #[must_use]
            pub const fn new(index: usize) -> Self {
                Self(index as u32)
            }

            #[must_use]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl From<$name> for usize {
            fn from(id: $name) -> usize {
                id.index()
            }
        }
    };
}

define_id!(
    /// Index into the vertex arena.
    VertexId,
    "v"
);
define_id!(
    /// Index into the vertex-instance (corner attribute) arena.
    VertexInstanceId,
    "vi"
);
define_id!(EdgeId, "e");
define_id!(PolygonId, "p");
define_id!(
    /// One material slot.
    PolygonGroupId,
    "pg"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_with_prefix() {
        assert_eq!(VertexId::new(3).to_string(), "v3");
        assert_eq!(PolygonGroupId(1).to_string(), "pg1");
        assert_eq!(usize::from(EdgeId(7)), 7);
    }
}
