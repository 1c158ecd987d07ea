pub mod action;
pub mod actuator;
pub mod driver;
pub mod frame_source;
pub mod perception;
pub mod reward;
pub mod runner;
pub mod util;
