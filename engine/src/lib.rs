pub mod app;
pub mod cli_args;
pub mod error;
pub mod image_model;
pub mod save_images;
pub mod settings;

pub use error::{Error, Result};
