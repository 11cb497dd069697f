// Domain-layer modules and shared errors/models
pub mod resolver {
    pub use crate::resolver::*;
}

pub mod context_inference {
    pub use crate::context_inference::*;
}

pub mod news_analysis {
    pub use crate::news_analysis::*;
}

pub mod guardrails {
    pub use crate::guardrails::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
