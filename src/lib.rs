pub mod api;
pub mod availability;
pub mod booker;
pub mod gate;
pub mod server;
pub mod store;
pub mod sync;
pub mod timegrid;
