pub mod ask;
pub mod chat;
pub mod doctor;
pub mod tools;

pub use ask::handle_ask;
pub use chat::handle_chat;
pub use doctor::handle_doctor;
pub use tools::handle_tools;
