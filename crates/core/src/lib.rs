pub mod analytics;
pub mod currency;
pub mod models;
pub mod traits;

pub use currency::*;
pub use models::*;
pub use traits::*;
