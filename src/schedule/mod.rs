//! Work estimation, task partitioning and workspace planning

pub mod flopcount;
pub mod hash_size;
pub mod partition;
pub mod workspace;

pub use flopcount::{flopcount, FlopCount};
pub use hash_size::{hash_table_size, TableMethod};
pub use partition::{partition, PartitionParams, Task, TaskList, TaskStats};
pub use workspace::{
    CoarseSlices, FineSlices, FineValueTables, StructureArena, TableKind, TableSpec, ValueArena, WorkspacePlan,
};
