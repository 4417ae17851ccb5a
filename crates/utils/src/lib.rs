pub mod assets;
pub mod port;
pub mod response;
