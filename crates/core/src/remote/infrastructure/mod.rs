pub mod channel_transport;
pub mod jpeg_base64_encoder;
pub mod websocket_host;
