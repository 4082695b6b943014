pub mod autograd;
pub mod config;
pub mod feasibility;
pub mod global_stage;
pub mod io;
pub mod objective;
pub mod parts;
pub mod verify;
pub mod workspace;

pub use autograd::{GVar, ParamManager};
pub use config::{Config, ObjMode};
pub use workspace::Workspace;
