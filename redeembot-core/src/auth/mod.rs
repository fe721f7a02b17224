pub mod callback_server;

pub use callback_server::{CallbackListener, CallbackResult, start_callback_server, test_port_available};
