mod schema;
mod store;

pub use store::{IndexStore, StoreError};
