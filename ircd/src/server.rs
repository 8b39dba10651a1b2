//! The server: configuration, shared directory, dispatch table and the
//! accept loop that wires each connection to its pair of tasks.

use std::{net::SocketAddr, sync::Arc};

use chrono::{DateTime, Local};
use irc_codec::Prefix;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc::unbounded_channel,
};
use tokio_rustls::TlsAcceptor;
use tracing::{error, info};

use crate::{
    client::Client,
    command::CommandMux,
    config::{ConfigError, ServerConfig},
    connection::Connection,
    directory::Directory,
    oper::{BasicOperAuth, OperAuth},
};

pub struct Server {
    config: ServerConfig,
    directory: Directory,
    mux: CommandMux,
    oper_auth: Box<dyn OperAuth>,
    tls: Option<TlsAcceptor>,
    created: DateTime<Local>,
}

impl Server {
    /// Builds a server from its configuration. TLS material is loaded here
    /// so a bad certificate path fails before the listener binds.
    pub fn new(config: ServerConfig) -> Result<Self, ConfigError> {
        let tls = match &config.tls {
            Some(tls_config) => Some(TlsAcceptor::from(tls_config.server_config()?)),
            None => None,
        };
        let oper_auth = Box::new(BasicOperAuth::from_map(config.opers.clone()));
        Ok(Self {
            config,
            directory: Directory::new(),
            mux: CommandMux::with_defaults(),
            oper_auth,
            tls,
            created: Local::now(),
        })
    }

    /// Swaps in a different operator-authentication backend.
    pub fn with_oper_auth(mut self, oper_auth: Box<dyn OperAuth>) -> Self {
        self.oper_auth = oper_auth;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn created(&self) -> String {
        self.created.to_rfc2822()
    }

    /// The prefix for server-sourced messages.
    pub fn prefix(&self) -> Prefix {
        Prefix::server(&self.config.name)
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn mux(&self) -> &CommandMux {
        &self.mux
    }

    pub fn oper_auth(&self) -> &dyn OperAuth {
        self.oper_auth.as_ref()
    }

    /// Binds the configured address. Split from [`Server::serve`] so callers
    /// can learn the bound port first.
    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        TcpListener::bind(&self.config.addr).await
    }

    /// The accept loop. Runs until the process exits.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    info!("Incoming connection from {}", addr);
                    self.accept_client(stream, addr);
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }

    /// Convenience: bind and serve in one call.
    pub async fn run(self: Arc<Self>) -> std::io::Result<()> {
        let listener = self.bind().await?;
        info!("Listening on {}", listener.local_addr()?);
        self.serve(listener).await;
        Ok(())
    }

    /// Wires up one accepted socket: a connection task owning the stream, a
    /// client task decoding and dispatching, and the ping supervisor.
    fn accept_client(self: &Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let (event_send, event_recv) = unbounded_channel();
        let conn = Connection::new(stream, self.tls.clone(), event_send);

        let authorized = self.config.password.is_empty();
        let client = Arc::new(Client::new(addr, conn, authorized));
        self.directory.add_client(Arc::clone(&client));

        tokio::spawn(Arc::clone(&client).supervise(Arc::clone(self)));
        tokio::spawn(client.run(Arc::clone(self), event_recv));
    }
}
