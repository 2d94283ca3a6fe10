pub mod audio;
pub mod resolver;
