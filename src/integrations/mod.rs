//! External service integrations.

pub mod fetcher {
    pub use crate::fetcher::*;
}

pub mod places {
    pub use crate::services::*;
}
