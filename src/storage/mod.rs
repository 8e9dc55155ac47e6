mod audit;
mod content;
pub mod db;
mod lookups;
pub mod models;
mod people;
mod resources;
mod tables;

pub use db::{Database, DatabaseError, TableStats};
pub use tables::*;
