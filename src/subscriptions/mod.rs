pub mod http;
pub mod signal;
pub mod udp;
