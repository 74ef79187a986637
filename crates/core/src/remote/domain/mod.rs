pub mod command;
pub mod frame_encoder;
pub mod transport;
