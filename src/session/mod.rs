pub mod app;
pub mod surface;
pub mod tracker;
pub mod undo;

pub use app::{ImageTarget, NullRenderer, Renderer, Session, SessionOptions};
