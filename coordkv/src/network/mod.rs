//! The network layer: how requests reach cluster members.

mod reqwest_transport;
mod transport;


pub use reqwest_transport::ReqwestTransport;
pub use transport::HttpRequest;
pub use transport::HttpResponse;
pub use transport::Method;
pub use transport::Transport;
