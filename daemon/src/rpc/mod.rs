use crate::core::{
    app::Application,
    driver::{DriverRequest, DriverResponse},
};
use anyhow::{bail, Context as AnyhowContext, Result};
use log::{debug, info, warn};
use olt_common::config::MAX_TRANSACTION_SIZE;
use std::sync::Arc;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::Mutex,
};

// Largest accepted driver frame; headroom over the max transaction size
// for the JSON envelope around it
const MAX_FRAME_SIZE: usize = MAX_TRANSACTION_SIZE * 2;

// Serves the consensus driver connection: length-prefixed JSON frames,
// one request per frame, answered in order. The driver serializes the
// block lifecycle, so a single application lock is the concurrency model.
pub struct DriverServer {
    app: Arc<Mutex<Application>>,
}

impl DriverServer {
    pub fn new(app: Arc<Mutex<Application>>) -> Self {
        Self { app }
    }

    pub async fn serve(&self, bind: &str) -> Result<()> {
        let listener = TcpListener::bind(bind)
            .await
            .with_context(|| format!("failed to bind driver endpoint {}", bind))?;
        info!("driver endpoint listening on {}", bind);

        loop {
            let (stream, peer) = listener.accept().await?;
            info!("driver connected from {}", peer);
            let app = self.app.clone();
            tokio::spawn(async move {
                if let Err(err) = handle_connection(stream, app).await {
                    warn!("driver connection closed: {}", err);
                }
            });
        }
    }
}

async fn handle_connection(mut stream: TcpStream, app: Arc<Mutex<Application>>) -> Result<()> {
    loop {
        let request = read_frame(&mut stream).await?;
        let response = dispatch(&app, request).await;
        write_frame(&mut stream, &response).await?;
    }
}

async fn dispatch(app: &Arc<Mutex<Application>>, request: DriverRequest) -> DriverResponse {
    debug!("driver request: {:?}", request_name(&request));
    let mut app = app.lock().await;
    match request {
        DriverRequest::Info => DriverResponse::Info(app.info()),
        DriverRequest::SetOption(_) => {
            DriverResponse::SetOption(crate::core::driver::ResponseSetOption { code: 0 })
        }
        DriverRequest::Query(req) => DriverResponse::Query(app.query(req)),
        DriverRequest::InitChain(req) => match app.init_chain(req) {
            Ok(response) => DriverResponse::InitChain(response),
            Err(err) => DriverResponse::Error {
                log: err.to_string(),
            },
        },
        DriverRequest::BeginBlock(req) => match app.begin_block(req) {
            Ok(()) => DriverResponse::BeginBlock {},
            Err(err) => DriverResponse::Error {
                log: err.to_string(),
            },
        },
        DriverRequest::CheckTx { tx } => DriverResponse::CheckTx(app.check_tx(&tx)),
        DriverRequest::DeliverTx { tx } => DriverResponse::DeliverTx(app.deliver_tx(&tx)),
        DriverRequest::EndBlock(req) => match app.end_block(req) {
            Ok(response) => DriverResponse::EndBlock(response),
            Err(err) => DriverResponse::Error {
                log: err.to_string(),
            },
        },
        DriverRequest::Commit => match app.commit() {
            Ok(response) => DriverResponse::Commit(response),
            Err(err) => DriverResponse::Error {
                log: err.to_string(),
            },
        },
    }
}

fn request_name(request: &DriverRequest) -> &'static str {
    match request {
        DriverRequest::Info => "info",
        DriverRequest::SetOption(_) => "set_option",
        DriverRequest::Query(_) => "query",
        DriverRequest::InitChain(_) => "init_chain",
        DriverRequest::BeginBlock(_) => "begin_block",
        DriverRequest::CheckTx { .. } => "check_tx",
        DriverRequest::DeliverTx { .. } => "deliver_tx",
        DriverRequest::EndBlock(_) => "end_block",
        DriverRequest::Commit => "commit",
    }
}

async fn read_frame(stream: &mut TcpStream) -> Result<DriverRequest> {
    let mut length_bytes = [0u8; 4];
    stream.read_exact(&mut length_bytes).await?;
    let length = u32::from_be_bytes(length_bytes) as usize;
    if length > MAX_FRAME_SIZE {
        bail!("driver frame of {} bytes exceeds the limit", length);
    }

    let mut payload = vec![0u8; length];
    stream.read_exact(&mut payload).await?;
    serde_json::from_slice(&payload).context("malformed driver frame")
}

async fn write_frame(stream: &mut TcpStream, response: &DriverResponse) -> Result<()> {
    let payload = serde_json::to_vec(response)?;
    stream.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    stream.write_all(&payload).await?;
    stream.flush().await?;
    Ok(())
}
