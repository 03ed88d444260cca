pub mod intent;
pub mod message;
pub mod model;
pub mod state;
