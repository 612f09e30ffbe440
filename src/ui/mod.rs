pub mod controls;
pub mod details;
pub mod picker;
