// HTTP routes
pub mod health;
pub mod jobs;
pub mod signals;

pub use health::*;
pub use jobs::*;
pub use signals::*;
