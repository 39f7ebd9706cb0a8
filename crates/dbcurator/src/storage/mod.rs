pub mod filesystem;

pub use filesystem::{
    copy_file_exclusive, create_run_workspace, ensure_directory, file_digest, find_similar_file,
    move_file, remove_workspace, ArtifactStorage, MoveMethod, Placement,
};
