pub mod buffer;
pub mod encoder;
pub mod session;
pub mod source;
pub mod stream;
pub mod types;
