mod csd;
pub use csd::*;
mod rotate;
pub use rotate::*;
mod shapes;
pub use shapes::*;
mod sparse;
pub use sparse::*;
