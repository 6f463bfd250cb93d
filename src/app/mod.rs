//! Session wiring: input, rendering boundary and the live loop

pub mod input;
pub mod render;
pub mod session;

pub use input::{spawn_stdin_reader, InputEvent};
pub use render::{LogSink, RenderSink};
pub use session::Session;
