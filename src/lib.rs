//! An async client for the QBox resource storage (key-value) service
//!
//! Every account may create many tables; each table maps arbitrary string
//! keys to files. This library covers the table operations: upload, download
//! grants, attributes, deletion, batch download grants and publishing a table
//! as a static-resource domain.
//!
//! # Features
//! - Bearer token authentication through a pluggable [`Credentials`] trait
//! - Async/await API using tokio, one round trip per operation
//! - Pluggable [`Transport`], with a pooled hyper client by default
//! - `table:key` entry addressing encoded as a single opaque path segment
//! - Batch download grants with results in request order
//! - Upload timeouts
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use qbox_rs_client::{BatchGetParam, ClientConfig, Connection, Service};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), qbox_rs_client::Error> {
//!     let config = ClientConfig::from_env();
//!     let conn = Connection::new("your-access-token", &config)?;
//!     let rs = Service::new(&conn, "my-table")?;
//!
//!     // Upload a local file
//!     let put = rs.put_file("hello.txt", Some("text/plain"), "./hello.txt", None).await?;
//!     println!("Stored with hash: {}", put.data.hash);
//!
//!     // Download grants for several keys at once
//!     let params = [
//!         BatchGetParam::from("hello.txt"),
//!         BatchGetParam::key("hello.txt").with_att_name("greeting.txt").with_expires(600),
//!     ];
//!     for item in rs.batch_get(&params).await?.data {
//!         println!("{:?}", item.ret().map(|ret| &ret.url));
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs, rust_2018_idioms)]

pub mod auth;
pub mod batch;
pub mod body;
pub mod config;
pub mod connection;
pub mod encoding;
pub mod error;
pub mod service;
pub mod transport;
pub mod types;

pub use auth::{BearerToken, Credentials};
pub use batch::BatchGetParam;
pub use config::ClientConfig;
pub use connection::Connection;
pub use error::{Error, Result};
pub use service::Service;
pub use transport::{HttpTransport, RawResponse, Transport};
pub use types::*;
