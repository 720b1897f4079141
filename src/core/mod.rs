// Domain-layer modules and shared errors/models
pub mod collector {
    pub use crate::collector::*;
}

pub mod export {
    pub use crate::export::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod orchestrator {
    pub use crate::orchestrator::*;
}

pub mod stats {
    pub use crate::stats::*;
}

pub mod errors {
    pub use crate::errors::*;
}
