pub mod entity;
pub mod error;
pub mod status;

pub use entity::{
    Entity, PLACEHOLDER_ID_PREFIX, StatusEntity, is_placeholder_id, new_placeholder_id,
};
pub use error::{
    MutationOp, ParseEnumError, PersistResult, PersistenceError, Result, SyncError,
};
pub use status::ProgressStatus;
