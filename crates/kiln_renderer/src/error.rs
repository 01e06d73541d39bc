//! Error types for rendering.

use kiln_core::SceneError;
use thiserror::Error;

/// Failures that stop a render. Numerical degeneracies inside the
/// integrator never surface here.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid scene: {0}")]
    Scene(#[from] SceneError),

    #[error("A render is already running on this controller")]
    Busy,

    #[error("Failed to allocate frame buffers for {pixels} pixels")]
    Allocation { pixels: usize },

    #[error("Failed to spawn render worker {index}: {source}")]
    ThreadSpawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Render aborted after {finished_tiles} of {total_tiles} tiles")]
    Aborted {
        finished_tiles: usize,
        total_tiles: usize,
    },

    #[error("Render stopped with {finished_tiles} of {total_tiles} tiles finished")]
    Incomplete {
        finished_tiles: usize,
        total_tiles: usize,
    },
}

pub type RenderResult<T> = Result<T, RenderError>;
