pub mod action;
pub mod error;
pub mod meta;
pub mod protocol;

pub use action::Action;
pub use meta::Meta;
pub use protocol::{Answer, Command, Status};
