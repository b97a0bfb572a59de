pub use self::{obstacle::*, world::*};

pub(crate) mod obstacle;
pub(crate) mod world;
