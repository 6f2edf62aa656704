//! Application orchestration module

pub mod initialization;
pub mod execution;

pub use initialization::{
    load_configuration,
    build_batch_config,
    configure_logging,
};
pub use execution::{run_batch, run_with};
