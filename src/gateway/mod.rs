pub mod signing;
pub mod request;
pub mod callback;

pub use request::{GatewayRedirect, GatewayRequestBuilder};
pub use callback::{GatewayCallbackVerifier, VerifiedCallback};
