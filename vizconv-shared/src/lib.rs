// SPDX-License-Identifier: GPL-3.0-only
pub mod models;
pub mod services;
pub mod source;
pub mod validation;

// Re-export commonly used types for convenience
pub use models::*;
pub use services::*;
pub use source::{SourceChange, SourceUnavailable, VisualizationSource, source_identity};
pub use validation::ValidationError;
