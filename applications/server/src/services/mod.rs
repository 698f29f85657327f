/// Server services
pub mod loader;
pub mod presenter;

pub use loader::{LoadedProfiles, ProfileLoader, Seeder, StoreSeeder};
pub use presenter::{ProfileView, ProfilesView};
