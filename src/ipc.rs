//! Unix-socket daemon: newline-delimited JSON requests in, `{"ok", "data"}`
//! responses out. The engine itself lives on the pipeline thread.

mod pipeline;
mod runtime;
mod server;

pub use server::{client_request, run_daemon};
