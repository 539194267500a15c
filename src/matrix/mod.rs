// Matrix data structures, masks and configuration

pub mod config;
pub mod conversion;
pub mod mask;
pub mod reference;
pub mod sparse;

pub use config::{
    AxbMethod, DispatchControl, PlatformAtomics, SaxpyConfig, SystemParameters, TaskTuning,
};
pub use mask::{apply_mask, Mask, MaskValues};
pub use reference::reference_mxm;
pub use sparse::{Format, SparseMatrix, Structure, Values};
