pub mod probe;
pub mod repository;

pub use probe::RepoState;
pub use repository::Repository;
