mod collection;
mod event;
mod media;
mod text;

pub use collection::*;
pub use event::*;
pub use media::*;
pub use text::*;
