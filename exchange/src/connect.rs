use crate::adapter::AdapterError;

use bytes::Bytes;
use fastwebsockets::FragmentCollector;
use http_body_util::Empty;
use hyper::{
    Request,
    header::{CONNECTION, UPGRADE},
    upgrade::Upgraded,
};
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::TcpStream;
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, OwnedTrustAnchor},
};
use url::Url;

use std::sync::LazyLock;

pub type WebSocket = FragmentCollector<TokioIo<Upgraded>>;

static TLS_CONNECTOR: LazyLock<TlsConnector> = LazyLock::new(tls_connector);

fn tls_connector() -> TlsConnector {
    let mut root_store = tokio_rustls::rustls::RootCertStore::empty();

    root_store.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.0.iter().map(|ta| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject,
            ta.spki,
            ta.name_constraints,
        )
    }));

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(std::sync::Arc::new(config))
}

pub enum State {
    Disconnected,
    Connected(WebSocket),
}

/// Opens a websocket to `url`, over TLS for `wss://`.
pub async fn connect_ws(url: &str) -> Result<WebSocket, AdapterError> {
    let parsed = Url::parse(url).map_err(|e| AdapterError::InvalidRequest(e.to_string()))?;

    let domain = parsed.host_str().ok_or_else(|| {
        AdapterError::InvalidRequest(format!("Missing host in websocket URL: {url}"))
    })?;

    let target_port = parsed.port_or_known_default().ok_or_else(|| {
        AdapterError::InvalidRequest("Missing port for websocket URL".to_string())
    })?;

    match parsed.scheme() {
        "wss" => {
            let stream = setup_tcp(domain, target_port).await?;
            let tls_stream = upgrade_to_tls(domain, stream).await?;
            upgrade_to_websocket(domain, tls_stream, &parsed).await
        }
        "ws" => {
            let stream = setup_tcp(domain, target_port).await?;
            upgrade_to_websocket(domain, stream, &parsed).await
        }
        scheme => Err(AdapterError::InvalidRequest(format!(
            "Invalid scheme for websocket URL: {scheme}"
        ))),
    }
}

async fn setup_tcp(domain: &str, target_port: u16) -> Result<TcpStream, AdapterError> {
    let addr = format!("{domain}:{target_port}");

    let tcp = TcpStream::connect(&addr)
        .await
        .map_err(|e| AdapterError::WebsocketError(format!("TCP connect to {addr}: {e}")))?;
    tcp.set_nodelay(true)
        .map_err(|e| AdapterError::WebsocketError(e.to_string()))?;

    Ok(tcp)
}

async fn upgrade_to_tls<S>(
    domain: &str,
    stream: S,
) -> Result<tokio_rustls::client::TlsStream<S>, AdapterError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let domain: tokio_rustls::rustls::ServerName =
        tokio_rustls::rustls::ServerName::try_from(domain)
            .map_err(|_| AdapterError::ParseError("invalid dnsname".to_string()))?;

    TLS_CONNECTOR
        .connect(domain, stream)
        .await
        .map_err(|e| AdapterError::WebsocketError(e.to_string()))
}

async fn upgrade_to_websocket<S>(
    domain: &str,
    stream: S,
    parsed: &Url,
) -> Result<WebSocket, AdapterError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let path_and_query = request_target(parsed);

    let req: Request<Empty<Bytes>> = Request::builder()
        .method("GET")
        .uri(path_and_query)
        .header("Host", domain)
        .header(UPGRADE, "websocket")
        .header(CONNECTION, "upgrade")
        .header(
            "Sec-WebSocket-Key",
            fastwebsockets::handshake::generate_key(),
        )
        .header("Sec-WebSocket-Version", "13")
        .body(Empty::<Bytes>::new())
        .map_err(|e| AdapterError::WebsocketError(e.to_string()))?;

    let exec = TokioExecutor::new();
    let (ws, _) = fastwebsockets::handshake::client(&exec, req, stream)
        .await
        .map_err(|e| AdapterError::WebsocketError(e.to_string()))?;

    Ok(FragmentCollector::new(ws))
}

fn request_target(url: &Url) -> String {
    let mut target = match url.path() {
        "" => "/".to_string(),
        path => path.to_string(),
    };

    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    target
}
