#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

//! Mesh baking: turns an editable polygon mesh into GPU-ready vertex and
//! index buffers, deriving normals, tangents and lightmap UVs on the way and
//! optionally handing the mesh to a pluggable reducer for LOD generation.

pub mod bake;

#[macro_export]
macro_rules! debug_log {
    ($($t:tt)*) => {{
        #[cfg(feature = "debug_logs")]
        {
            ::log::trace!($($t)*);
        }
    }};
}
