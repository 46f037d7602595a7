//! API endpoint handlers, one module per resource.

pub mod feedback;
pub mod generate;
pub mod health;
pub mod letters;
