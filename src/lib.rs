pub mod api;
pub mod args;
pub mod config;
mod dsl;
pub mod engine;
pub mod error;
mod finalize;
pub mod model;
pub mod registry;
pub mod resolver;
pub mod serialization;
pub mod step;
pub mod utils;
pub mod validate;

pub use api::{evaluate, evaluate_with, evaluate_with_config_file, Design};
pub use dsl::{connect, delete, get, head, options, patch, post, put, trace};

/// Everything a design definition usually needs in scope.
pub mod prelude {
    pub use crate::args;
    pub use crate::args::{body, Arg};
    pub use crate::config::EvalConfig;
    pub use crate::dsl::{connect, delete, get, head, options, patch, post, put, trace};
    pub use crate::engine::Session;
    pub use crate::model::{EntityId, Primitive};
    pub use crate::resolver::TypeRef;
    pub use crate::{evaluate, evaluate_with};
}
