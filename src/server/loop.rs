// Server loop module
// Accepts connections until shutdown is requested

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::{accept_connection, ServerContext};
use crate::logger;

/// Accept loop. Returns once `shutdown` is notified; connections already
/// being served finish on their own tasks.
pub async fn server_loop(listener: TcpListener, ctx: Arc<ServerContext>, shutdown: Arc<Notify>) {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => accept_connection(stream, peer_addr, &ctx),
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            () = shutdown.notified() => {
                let open = ctx.active_connections();
                if open > 0 {
                    logger::log_warning(&format!(
                        "Listener closed with {open} connection(s) still open"
                    ));
                }
                break;
            }
        }
    }
}
