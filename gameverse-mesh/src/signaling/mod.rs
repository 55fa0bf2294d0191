mod signaling_output;
mod ws_signaling;

pub use signaling_output::SignalingOutput;
pub use ws_signaling::WsSignaling;
