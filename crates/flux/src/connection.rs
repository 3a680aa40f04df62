//! Per-connection pumps.
//!
//! Each accepted connection gets a reader (this task) and a writer (a
//! spawned task). The reader forwards raw packets to the dispatcher; the
//! writer drains the client's outbox onto the socket. Either side ending
//! ends both, and the dispatcher always receives exactly one disconnect
//! sentinel per connection.

use std::sync::Arc;

use flux_hub::HubHandle;
use flux_transport::Connection;
use tokio::sync::mpsc;

use crate::dispatcher::Packet;

/// Serves one connection from accept to close.
pub(crate) async fn serve_connection<C: Connection>(
    conn: C,
    hub: HubHandle,
    inbound: mpsc::Sender<Packet>,
) {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let (client, mut outbox) = hub.open_client(conn_id);

    if let Err(e) = hub.register(client.clone()).await {
        tracing::warn!(%conn_id, error = %e, "could not register client");
        let _ = conn.close().await;
        return;
    }
    tracing::debug!(%conn_id, hub = hub.name(), "client connected");

    let writer = {
        let conn = Arc::clone(&conn);
        let client = client.clone();
        tokio::spawn(async move {
            while let Some(bytes) = outbox.next().await {
                if let Err(e) = conn.send(&bytes).await {
                    tracing::debug!(%conn_id, error = %e, "write failed");
                    break;
                }
            }
            // A failed write counts as a disconnect.
            client.close();
            let _ = conn.close().await;
        })
    };

    loop {
        tokio::select! {
            result = conn.recv() => match result {
                Ok(Some(data)) => {
                    if inbound.send(Packet::data(data, client.clone())).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "read failed");
                    break;
                }
            },
            _ = client.closed() => break,
        }
    }

    let _ = inbound.send(Packet::disconnect(client.clone())).await;
    let _ = hub.unregister(conn_id).await;
    client.close();
    let _ = writer.await;
    tracing::debug!(%conn_id, hub = hub.name(), "client disconnected");
}
