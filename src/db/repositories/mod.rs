pub mod binding;
pub mod category;
pub mod record;
pub mod run_state;
pub mod source;
