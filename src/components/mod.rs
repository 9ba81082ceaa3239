pub mod colors;
pub mod palette;
pub mod tools;
