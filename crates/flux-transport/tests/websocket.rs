//! Integration tests for the WebSocket transport.
//!
//! These tests spin up a real WebSocket server and client to verify
//! that data actually flows over the network.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use flux_transport::{Connection, Transport, WebSocketTransport};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on an OS-assigned port, connects one client and returns
    /// both ends.
    async fn connected_pair() -> (flux_transport::WebSocketConnection, ClientWs)
    {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("bound address");

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let (client_ws, _) =
            tokio_tungstenite::connect_async(format!("ws://{addr}"))
                .await
                .expect("client should connect");
        let server_conn = server_handle.await.expect("task should complete");
        (server_conn, client_ws)
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (server_conn, mut client_ws) = connected_pair().await;
        assert!(server_conn.id().into_inner() > 0);

        // --- Server sends JSON, client receives a text frame ---
        server_conn
            .send(br#"{"name":"server:createId","message":1}"#)
            .await
            .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(msg.is_text(), "UTF-8 payloads go out as text frames");
        assert_eq!(
            msg.into_data().as_ref(),
            br#"{"name":"server:createId","message":1}"#,
        );

        // --- Client sends, server receives ---
        client_ws
            .send(Message::text(r#"[{"name":"user:join","args":{}}]"#))
            .await
            .unwrap();

        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, br#"[{"name":"user:join","args":{}}]"#);

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_send_and_recv_are_independent() {
        let (server_conn, mut client_ws) = connected_pair().await;
        let server_conn = std::sync::Arc::new(server_conn);

        // A reader parked in recv() must not block a concurrent send().
        let reader = {
            let conn = std::sync::Arc::clone(&server_conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            server_conn.send(b"ping"),
        )
        .await
        .expect("send must not wait for the reader")
        .expect("send should succeed");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"ping");

        client_ws.send(Message::Close(None)).await.unwrap();
        let result = reader.await.unwrap().expect("recv should not error");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (server_conn, mut client_ws) = connected_pair().await;

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_idle_peer_does_not_block_later_clients() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("bound address");

        // Connects but never sends the upgrade request.
        let _idle = tokio::net::TcpStream::connect(addr)
            .await
            .expect("raw connect");

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let connect = tokio_tungstenite::connect_async(format!("ws://{addr}"));
        let (_client_ws, _) =
            tokio::time::timeout(std::time::Duration::from_secs(3), connect)
                .await
                .expect("browser must not wait behind the idle peer")
                .expect("client should connect");

        let conn = tokio::time::timeout(
            std::time::Duration::from_secs(3),
            server_handle,
        )
        .await
        .expect("accept should return the upgraded client")
        .expect("task should complete");
        assert!(conn.id().into_inner() > 0);
    }

    #[tokio::test]
    async fn test_stalled_handshake_is_dropped_after_timeout() {
        use tokio::io::AsyncReadExt;

        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind")
            .with_handshake_timeout(std::time::Duration::from_millis(100));
        let addr = transport.local_addr().expect("bound address");
        let _server = tokio::spawn(async move {
            let _ = transport.accept().await;
        });

        let mut idle = tokio::net::TcpStream::connect(addr)
            .await
            .expect("raw connect");
        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            idle.read(&mut buf),
        )
        .await
        .expect("server should hang up on the stalled peer")
        .unwrap_or(0);
        assert_eq!(n, 0);
    }
}
