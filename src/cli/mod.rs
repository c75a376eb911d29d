pub mod commands;
pub mod ui;
pub mod util;

pub use util::{CommandContext, mask_key, read_input};
