pub mod authorization;
pub mod bus;
pub mod controller;
mod error;
pub mod handler;
pub mod stream;

pub use authorization::AuthorizationFlag;
pub use bus::{Bus, BusError, HttpBus, RecordingBus};
pub use controller::{ActionController, Resending, Response};
pub use error::DispatchError;
pub use handler::{ActionHandler, Dispatcher, HandlerError, HandlerRegistry};
pub use stream::{Chunk, SharedStream, Stream, StreamError, StreamWriter};
