pub mod model;
pub mod queue;
pub mod server;
pub mod stream;
