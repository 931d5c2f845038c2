pub mod http;
pub mod intent;
pub mod price;
pub mod rpc;
pub mod snapshot;
pub mod stream;
pub mod transfers;
pub mod values;
