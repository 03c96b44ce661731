//! Asynchronous RESP3 client with a multiplexing, self-healing connection.
//!
//! The crate has two layers:
//!
//! - [`resp3`]: an incremental parser that turns wire bytes into adapter
//!   callbacks, plus the wire types and serialization helpers.
//! - [`Connection`]: a connection engine that pipelines requests over one
//!   socket, matches replies to requests in order, delivers server pushes
//!   out-of-band and reconnects transparently.
//!
//! # Examples
//!
//! ```no_run
//! use resplink::{adapter::StringAdapter, Config, Connection, Request};
//!
//! # async fn example() -> Result<(), resplink::Error> {
//! let conn = Connection::new(Config::new("127.0.0.1", "6379"));
//! let runner = {
//!     let conn = conn.clone();
//!     tokio::spawn(async move { conn.run().await })
//! };
//!
//! let mut req = Request::new();
//! req.push("SET", &["greeting", "hello"]);
//! req.push("GET", &["greeting"]);
//! let mut value = StringAdapter::new();
//! conn.exec(&req, &mut value).await?;
//! # runner.abort();
//! # Ok(())
//! # }
//! ```

pub mod adapter;
mod config;
mod connection;
mod error;
pub mod push;
mod request;
pub mod resp3;

pub use config::Config;
pub use connection::{Connection, ConnectionState, Operation};
pub use error::{Error, Result, SharedError};
pub use push::PushFrame;
pub use request::{Request, RequestConfig};
