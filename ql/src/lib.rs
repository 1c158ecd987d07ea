pub mod learn;
pub mod log;
pub mod model_file;
pub mod prelude;
pub mod state;
pub mod table;
