pub mod admission;
pub mod entry;
pub mod enums;
pub mod feedback;
pub mod letter;
pub mod source;

pub use admission::*;
pub use entry::*;
pub use feedback::*;
pub use letter::*;
pub use source::*;
