pub mod entity;
pub mod memory;
pub mod migrations;
pub mod sea_orm_repo;

pub use memory::InMemoryStore;
pub use sea_orm_repo::SeaRepositories;
