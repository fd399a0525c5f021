pub mod builders;
pub mod contexts;
pub mod errors;
pub mod meshes;

pub use builders::*;
pub use contexts::*;
pub use errors::*;
pub use meshes::*;
