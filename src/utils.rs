//! Utility functions and helpers.

pub mod preflight;
pub mod settings;

pub use preflight::{
    check_ai_credentials, check_git_repository, check_index_empty, check_split_prerequisites,
    AiCredentialInfo,
};
pub use settings::{get_env_var, get_env_vars, Settings, SplitSettings};
