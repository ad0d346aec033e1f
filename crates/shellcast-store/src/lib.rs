pub mod error;
pub mod schema;
pub mod settings;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use settings::EffectiveSettings;
pub use store::Store;
pub use types::{SessionRow, SessionStatus};
