// Data structures shared by the services and the local API

pub mod cluster;
pub mod response;
pub mod status;
pub mod subscription;

pub use cluster::*;
pub use response::*;
pub use status::*;
pub use subscription::*;
