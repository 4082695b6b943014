use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which bound a session optimizes or verifies.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ObjMode {
    /// Minimize omega for a fixed rectangular parameter K.
    Omega,
    /// Maximize K subject to omega == 2 (dual exponent of matrix multiplication).
    Alpha,
    /// Minimize K subject to omega(K) <= 1 + 2K.
    Mu,
}

impl FromStr for ObjMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "omega" => Ok(ObjMode::Omega),
            "alpha" => Ok(ObjMode::Alpha),
            "mu" => Ok(ObjMode::Mu),
            _ => Err(anyhow!("Unknown objective mode: {}", s)),
        }
    }
}

impl fmt::Display for ObjMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjMode::Omega => write!(f, "omega"),
            ObjMode::Alpha => write!(f, "alpha"),
            ObjMode::Mu => write!(f, "mu"),
        }
    }
}

/// Immutable-after-build session context. One `Config` is owned by one
/// [`crate::Workspace`]; nothing in the crate reads ambient global state.
#[derive(Serialize, Deserialize, Debug, Copy, Clone)]
pub struct Config {
    /// The base tensor parameter q (the construction works over CW_q).
    pub q: f64,
    pub obj_mode: ObjMode,
    /// Rectangular parameter; pinned in omega mode, free otherwise.
    pub k: f64,
}

impl Config {
    pub fn new(q: f64, obj_mode: ObjMode, k: f64) -> Self {
        Self { q, obj_mode, k }
    }
}
