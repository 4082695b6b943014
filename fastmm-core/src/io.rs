//! Parameter archives and initial-point records.

use crate::workspace::Workspace;
use anyhow::{bail, Context, Result};
use fastmm_utils::Shape;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// On-disk parameter archive: one flat vector named `params`.
#[derive(Debug, Serialize, Deserialize)]
struct ParamArchive {
    params: Vec<f64>,
}

/// One seed record of an initial-point file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialDist {
    pub shape: [usize; 3],
    pub dist: Vec<f64>,
}

/// Write the workspace's current parameter vector, creating parent
/// directories as needed.
pub fn save_param(path: &Path, ws: &Workspace) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
    }
    let archive = ParamArchive {
        params: ws.param_manager.cur_x().to_vec(),
    };
    let data = serde_json::to_string(&archive)?;
    fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Load a saved parameter vector into the workspace. The vector must match
/// the registered parameter count exactly, or fall short by exactly one, in
/// which case `k` (or the session's K) is spliced in at the K parameter's
/// offset; any other length is fatal.
pub fn load_param(path: &Path, k: Option<f64>, ws: &mut Workspace) -> Result<Vec<f64>> {
    let data =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let archive: ParamArchive =
        serde_json::from_str(&data).with_context(|| format!("Failed to parse {}", path.display()))?;
    let mut vec = archive.params;

    let expected = ws.param_manager.num_input();
    if vec.len() == expected {
        ws.param_manager.set_value(&vec)?;
    } else if vec.len() + 1 == expected {
        let k = k.unwrap_or(ws.config.k);
        eprintln!("[WARN] Old-version parameters loading. Setting K = {:.4}", k);
        vec.insert(ws.k_pos(), k);
        ws.param_manager.set_value(&vec)?;
    } else {
        bail!(
            "Parameter dimension mismatch: expected {}, got {}",
            expected,
            vec.len()
        );
    }
    Ok(vec)
}

/// Read an initial-point file: a list of `{shape, dist}` records.
pub fn load_initial_dists(path: &Path) -> Result<Vec<InitialDist>> {
    let data =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let dists: Vec<InitialDist> =
        serde_json::from_str(&data).with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(dists)
}

/// Establish a starting point: seed from the initial-point file when it is
/// readable, otherwise fall back to random initialization.
pub fn initial_point<R: Rng>(ws: &mut Workspace, rng: &mut R, path: &Path) -> Result<()> {
    match load_initial_dists(path) {
        Ok(records) => {
            let seeds: Vec<(Shape, Vec<f64>)> =
                records.into_iter().map(|r| (r.shape, r.dist)).collect();
            ws.seed_initial(&seeds)?;
        }
        Err(e) => {
            eprintln!("[WARN] Cannot load initial parameters: {:#}", e);
            eprintln!("[INFO] Using random initialization instead.");
            ws.param_manager.random_init(rng);
            ws.set_initial();
        }
    }
    Ok(())
}
