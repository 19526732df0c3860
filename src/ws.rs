use futures::future::BoxFuture;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

use crate::error::Result;
use crate::stats::{StatsConnection, StatsTransport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Stats transport over a WebSocket.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

struct WsConnection {
    ws: WsStream,
}

impl StatsTransport for WsTransport {
    fn connect(&self, url: Url) -> BoxFuture<'static, Result<Box<dyn StatsConnection>>> {
        Box::pin(async move {
            let (ws, response) = connect_async(url.as_str()).await?;
            debug!(%url, status = %response.status(), "websocket connected");
            Ok(Box::new(WsConnection { ws }) as Box<dyn StatsConnection>)
        })
    }
}

impl StatsConnection for WsConnection {
    fn next_message(&mut self) -> BoxFuture<'_, Option<Result<String>>> {
        Box::pin(async move {
            loop {
                match self.ws.next().await? {
                    Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                    Ok(Message::Binary(bytes)) => {
                        return Some(Ok(String::from_utf8_lossy(&bytes).into_owned()))
                    }
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "server sent close frame");
                        return None;
                    }
                    Ok(_) => continue,
                    Err(err) => return Some(Err(err.into())),
                }
            }
        })
    }

    fn close(mut self: Box<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            if let Err(err) = self.ws.close(None).await {
                debug!(%err, "websocket close failed");
            }
            // Drain until the server acknowledges the close.
            while let Some(Ok(_)) = self.ws.next().await {}
        })
    }
}
