mod gvar;
pub use gvar::*;
mod param_manager;
pub use param_manager::*;
