//! Resource storage operations bound to one table
//!
//! Each method builds its path, then performs exactly one call through the
//! [`Connection`]. Upload and upload-authorization go to the IO host,
//! everything else to the RS host.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::AsyncRead;
use tracing::debug;

use crate::batch::{encode_batch_get, get_path, BatchGetParam};
use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::encoding::{encode, encoded_entry, validate_table};
use crate::error::{Error, Result};
use crate::transport::{HttpTransport, Transport};
use crate::types::{BatchGetItem, CallResult, Entry, GetRet, PutAuthRet, PutRet, Reply};

/// Mime type sent when the caller gives none
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Status reported by a batch get that had nothing to do
const EMPTY_BATCH_STATUS: u16 = 200;

/// The key-value operations of one table.
///
/// Every account may own many tables; keys are arbitrary strings and every
/// value is a file.
///
/// # Example
/// ```rust,no_run
/// use qbox_rs_client::{ClientConfig, Connection, Service};
///
/// #[tokio::main]
/// async fn main() -> Result<(), qbox_rs_client::Error> {
///     let config = ClientConfig::default();
///     let conn = Connection::new("access-token", &config)?;
///     let photos = Service::new(&conn, "photos")?;
///
///     let grant = photos.get("cat.jpg", Some("cat.jpg")).await?;
///     println!("download from {}", grant.data.url);
///     Ok(())
/// }
/// ```
pub struct Service<'c, T = HttpTransport> {
    conn: &'c Connection<T>,
    table: String,
}

impl<'c, T: Transport> Service<'c, T> {
    /// Bind `conn` to `table`, using the hosts `conn` was configured with.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTable`] unless the table name is non-empty and
    /// made only of ASCII letters, digits, `-`, `.`, `_` and `~`. Returns
    /// [`Error::InvalidUrl`] if a configured host is not a URL.
    pub fn new(conn: &'c Connection<T>, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_table(&table)?;
        conn.config().validate()?;
        Ok(Self { conn, table })
    }

    /// The table this service operates on
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The configuration in use
    pub fn config(&self) -> &ClientConfig {
        self.conn.config()
    }

    fn io_url(&self, path: &str) -> String {
        format!("{}{}", self.config().io_host, path)
    }

    fn rs_url(&self, path: &str) -> String {
        format!("{}{}", self.config().rs_host, path)
    }

    /// Get a short-lived URL accepting one anonymous upload.
    pub async fn put_auth(&self) -> CallResult<PutAuthRet> {
        self.conn.call(&self.io_url("/put-auth/")).await
    }

    /// Upload `length` bytes from `stream` under `key`.
    ///
    /// A missing or empty `mime_type` is sent as `application/octet-stream`.
    /// `timeout` defaults to the configured put timeout.
    pub async fn put<S>(
        &self,
        key: &str,
        mime_type: Option<&str>,
        stream: S,
        length: u64,
        timeout: Option<Duration>,
    ) -> CallResult<PutRet>
    where
        S: AsyncRead + Unpin + Send + 'static,
    {
        let mime_type = mime_type
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE);
        let url = self.io_url(&format!(
            "/rs-put/{}/mimeType/{}",
            encoded_entry(&self.table, key),
            encode(mime_type)
        ));
        let timeout = timeout.unwrap_or(Duration::from_millis(self.config().put_timeout_ms));

        self.conn.call_with_binary(&url, stream, length, timeout).await
    }

    /// Upload the local file at `path` under `key`.
    ///
    /// A file that cannot be opened fails with [`Error::FileOpen`] before
    /// anything is sent. The handle is released when this returns, whatever
    /// the outcome.
    pub async fn put_file(
        &self,
        key: &str,
        mime_type: Option<&str>,
        path: impl AsRef<Path>,
        timeout: Option<Duration>,
    ) -> CallResult<PutRet> {
        let path = path.as_ref();
        let file = match File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                debug!("Cannot open {}: {}", path.display(), e);
                return Err(Error::FileOpen(path.to_path_buf()));
            }
        };

        let metadata = match file.metadata().await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return Err(Error::FileOpen(path.to_path_buf())),
        };

        self.put(key, mime_type, file, metadata.len(), timeout).await
    }

    /// Get a short-lived download URL for `key`, optionally naming the
    /// attachment.
    pub async fn get(&self, key: &str, att_name: Option<&str>) -> CallResult<GetRet> {
        let url = self.rs_url(&get_path(&self.table, key, att_name, None));
        self.conn.call(&url).await
    }

    /// Like [`get`](Self::get), but fails if the entry no longer matches
    /// `base` (the hash seen earlier). Used to resume downloads.
    pub async fn get_if_not_modified(
        &self,
        key: &str,
        att_name: &str,
        base: &str,
    ) -> CallResult<GetRet> {
        let url = self.rs_url(&format!(
            "/get/{}/attName/{}/base/{}",
            encoded_entry(&self.table, key),
            encode(att_name),
            base
        ));
        self.conn.call(&url).await
    }

    /// Get download URLs for many keys in one round trip.
    ///
    /// Results come back in the order of `params`. An empty `params`
    /// returns an empty list without contacting the service.
    pub async fn batch_get(&self, params: &[BatchGetParam]) -> CallResult<Vec<BatchGetItem>> {
        if params.is_empty() {
            debug!("Empty batch get on table {}, nothing to send", self.table);
            return Ok(Reply {
                code: EMPTY_BATCH_STATUS,
                data: Vec::new(),
            });
        }

        let ops = encode_batch_get(&self.table, params);
        self.conn.call_with_params(&self.rs_url("/batch"), &ops).await
    }

    /// Get the attributes of `key`.
    pub async fn stat(&self, key: &str) -> CallResult<Entry> {
        let url = self.rs_url(&format!("/stat/{}", encoded_entry(&self.table, key)));
        self.conn.call(&url).await
    }

    /// Serve this table's entries as static resources at `http://<domain>/<key>`.
    pub async fn publish(&self, domain: &str) -> Result<u16> {
        let url = self.rs_url(&format!(
            "/publish/{}/from/{}",
            encode(domain),
            encode(&self.table)
        ));
        self.conn.call_no_return(&url).await
    }

    /// Stop serving `domain`.
    pub async fn unpublish(&self, domain: &str) -> Result<u16> {
        let url = self.rs_url(&format!("/unpublish/{}", encode(domain)));
        self.conn.call_no_return(&url).await
    }

    /// Delete `key`.
    pub async fn delete(&self, key: &str) -> Result<u16> {
        let url = self.rs_url(&format!("/delete/{}", encoded_entry(&self.table, key)));
        self.conn.call_no_return(&url).await
    }

    /// Delete the whole table. Irreversible.
    pub async fn drop_table(&self) -> Result<u16> {
        let url = self.rs_url(&format!("/drop/{}", encode(&self.table)));
        self.conn.call_no_return(&url).await
    }
}

impl<T> fmt::Debug for Service<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("table", &self.table)
            .field("conn", self.conn)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use http::header::CONTENT_TYPE;

    use crate::auth::BearerToken;
    use crate::error::LOCAL_FAILURE;
    use crate::transport::mock::MockTransport;

    const GET_RET: &str = r#"{"url":"http://io.example.com/file/1","hash":"h1","mimeType":"text/plain","fsize":5,"expires":3600}"#;

    fn config() -> ClientConfig {
        ClientConfig {
            io_host: "http://io.test".to_string(),
            rs_host: "http://rs.test".to_string(),
            ..Default::default()
        }
    }

    fn connection(transport: MockTransport) -> Connection<MockTransport> {
        Connection::with_transport(config(), Arc::new(BearerToken::new("t0ken")), transport)
    }

    #[test]
    fn test_new_rejects_ambiguous_table() {
        let conn = connection(MockTransport::new());
        let err = Service::new(&conn, "a:b").unwrap_err();
        assert!(matches!(err, Error::InvalidTable(_)));
        assert!(Service::new(&conn, "a/b").is_err());
        assert!(Service::new(&conn, "photos").is_ok());
    }

    #[test]
    fn test_new_rejects_path_breaking_table() {
        let conn = connection(MockTransport::new());
        for table in ["logs#old", "logs?x=1", "logs%2F", "my logs", "", "logs\n"] {
            let err = Service::new(&conn, table).unwrap_err();
            assert!(matches!(err, Error::InvalidTable(_)), "{:?} accepted", table);
            assert_eq!(err.code(), LOCAL_FAILURE);
        }
        assert!(Service::new(&conn, "backup-2024_v1.0~").is_ok());
    }

    #[test]
    fn test_new_uses_connection_config() {
        let conn = connection(MockTransport::new());
        let rs = Service::new(&conn, "t").unwrap();
        assert_eq!(rs.config(), &config());
        assert_eq!(rs.table(), "t");
    }

    #[test]
    fn test_new_rejects_invalid_connection_config() {
        let conn = Connection::with_transport(
            ClientConfig::with_host("ftp://rs.test"),
            Arc::new(BearerToken::new("t0ken")),
            MockTransport::new(),
        );
        let err = Service::new(&conn, "t").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[test]
    fn test_debug_hides_token() {
        let conn = connection(MockTransport::new());
        let rs = Service::new(&conn, "photos").unwrap();

        let debug = format!("{:?}", rs);
        assert!(debug.contains("photos"));
        assert!(debug.contains("http://rs.test"));
        assert!(!debug.contains("t0ken"));
    }

    #[tokio::test]
    async fn test_put_auth() {
        let conn = connection(
            MockTransport::new().reply(200, r#"{"url":"http://io.test/upload/x","expiresIn":600}"#),
        );
        let rs = Service::new(&conn, "t").unwrap();

        let reply = rs.put_auth().await.unwrap();
        assert_eq!(reply.data.expires_in, 600);
        assert_eq!(conn.transport().last().uri, "http://io.test/put-auth/");
    }

    #[tokio::test]
    async fn test_put_default_mime_type() {
        let conn = connection(MockTransport::new().reply(200, r#"{"hash":"h"}"#).reply(200, r#"{"hash":"h"}"#));
        let rs = Service::new(&conn, "t").unwrap();
        let data: &[u8] = b"12345";

        rs.put("k", None, data, 5, None).await.unwrap();
        assert_eq!(
            conn.transport().last().uri,
            "http://io.test/rs-put/t%3Ak/mimeType/application%2Foctet-stream"
        );

        rs.put("k", Some(""), data, 5, None).await.unwrap();
        assert_eq!(
            conn.transport().last().uri,
            "http://io.test/rs-put/t%3Ak/mimeType/application%2Foctet-stream"
        );
    }

    #[tokio::test]
    async fn test_put_explicit_mime_type_and_body() {
        let conn = connection(MockTransport::new().reply(200, r#"{"hash":"FmDZ"}"#));
        let rs = Service::new(&conn, "docs").unwrap();
        let data: &[u8] = b"{\"a\":1}";

        let reply = rs
            .put("dir/a.json", Some("application/json"), data, 7, Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(reply.code, 200);
        assert_eq!(reply.data.hash, "FmDZ");

        let sent = conn.transport().last();
        assert_eq!(
            sent.uri,
            "http://io.test/rs-put/docs%3Adir%2Fa.json/mimeType/application%2Fjson"
        );
        assert_eq!(&sent.body[..], b"{\"a\":1}");
    }

    #[tokio::test]
    async fn test_put_file_uploads_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"file contents").unwrap();
        file.flush().unwrap();

        let conn = connection(MockTransport::new().reply(200, r#"{"hash":"h"}"#));
        let rs = Service::new(&conn, "t").unwrap();

        let reply = rs.put_file("k", Some("text/plain"), file.path(), None).await.unwrap();
        assert_eq!(reply.data.hash, "h");

        let sent = conn.transport().last();
        assert_eq!(&sent.body[..], b"file contents");
        assert_eq!(sent.uri, "http://io.test/rs-put/t%3Ak/mimeType/text%2Fplain");
    }

    #[tokio::test]
    async fn test_put_file_missing_path_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist.bin");

        let conn = connection(MockTransport::new());
        let rs = Service::new(&conn, "t").unwrap();

        let err = rs.put_file("k", None, &missing, None).await.unwrap_err();
        assert_eq!(err.code(), LOCAL_FAILURE);
        match &err {
            Error::FileOpen(path) => assert_eq!(path, &missing),
            e => panic!("Expected FileOpen error, got: {:?}", e),
        }
        assert_eq!(err.to_string(), format!("open file failed: {}", missing.display()));
        assert!(conn.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn test_put_file_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let conn = connection(MockTransport::new());
        let rs = Service::new(&conn, "t").unwrap();

        let err = rs.put_file("k", None, dir.path(), None).await.unwrap_err();
        assert!(matches!(err, Error::FileOpen(_)));
        assert!(conn.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn test_put_file_releases_handle_on_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        std::fs::write(&path, b"x").unwrap();
        let path = std::fs::canonicalize(&path).unwrap();

        let conn = connection(MockTransport::new().reply(500, r#"{"error":"disk full"}"#));
        let rs = Service::new(&conn, "t").unwrap();

        let err = rs.put_file("k", None, &path, None).await.unwrap_err();
        assert_eq!(err.code(), 500);
        assert_eq!(conn.transport().requests().len(), 1);

        #[cfg(target_os = "linux")]
        {
            let still_open = std::fs::read_dir("/proc/self/fd")
                .unwrap()
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| std::fs::read_link(entry.path()).ok())
                .any(|target| target == path);
            assert!(!still_open, "descriptor for {} leaked", path.display());
        }
    }

    #[tokio::test]
    async fn test_get_with_and_without_att_name() {
        let conn = connection(MockTransport::new().reply(200, GET_RET).reply(200, GET_RET).reply(200, GET_RET));
        let rs = Service::new(&conn, "t").unwrap();

        let reply = rs.get("a b", None).await.unwrap();
        assert_eq!(reply.data.hash, "h1");
        assert_eq!(conn.transport().last().uri, "http://rs.test/get/t%3Aa%20b");

        rs.get("k", Some("")).await.unwrap();
        assert_eq!(conn.transport().last().uri, "http://rs.test/get/t%3Ak");

        rs.get("k", Some("report 1.pdf")).await.unwrap();
        assert_eq!(
            conn.transport().last().uri,
            "http://rs.test/get/t%3Ak/attName/report%201.pdf"
        );
    }

    #[tokio::test]
    async fn test_get_if_not_modified() {
        let conn = connection(MockTransport::new().reply(200, GET_RET));
        let rs = Service::new(&conn, "t").unwrap();

        rs.get_if_not_modified("k", "k.bin", "FmDZwqadA4-ib_15hYfQpb7UXUYR")
            .await
            .unwrap();
        assert_eq!(
            conn.transport().last().uri,
            "http://rs.test/get/t%3Ak/attName/k.bin/base/FmDZwqadA4-ib_15hYfQpb7UXUYR"
        );
    }

    #[tokio::test]
    async fn test_batch_get_preserves_order() {
        let body = r#"[
            {"code":200,"data":{"url":"http://io.test/a","hash":"ha"}},
            {"code":200,"data":{"url":"http://io.test/b","hash":"hb"}}
        ]"#;
        let conn = connection(MockTransport::new().reply(200, body));
        let rs = Service::new(&conn, "T").unwrap();

        let params = vec![
            BatchGetParam::from("a"),
            BatchGetParam::KeyWithOptions {
                key: "b".to_string(),
                att_name: Some("x".to_string()),
                expires: None,
            },
        ];
        let reply = rs.batch_get(&params).await.unwrap();

        let sent = conn.transport().last();
        assert_eq!(sent.uri, "http://rs.test/batch");
        assert_eq!(&sent.body[..], b"op=/get/T%3Aa&op=/get/T%3Ab/attName/x");
        assert_eq!(sent.headers[CONTENT_TYPE], "application/x-www-form-urlencoded");

        let hashes: Vec<&str> = reply
            .data
            .iter()
            .map(|item| item.ret().unwrap().hash.as_str())
            .collect();
        assert_eq!(hashes, ["ha", "hb"]);
        assert_eq!(params.len(), 2);
    }

    #[tokio::test]
    async fn test_batch_get_partial_failure() {
        let body = r#"[
            {"code":200,"data":{"url":"http://io.test/a"}},
            {"code":612,"data":{"error":"no such file or directory"}}
        ]"#;
        let conn = connection(MockTransport::new().reply(298, body));
        let rs = Service::new(&conn, "t").unwrap();

        let reply = rs.batch_get(&[BatchGetParam::from("a"), BatchGetParam::from("gone")]).await.unwrap();
        assert_eq!(reply.code, 298);
        assert!(reply.data[0].is_ok());
        assert_eq!(reply.data[1].code, 612);
        assert_eq!(reply.data[1].error(), Some("no such file or directory"));
    }

    #[tokio::test]
    async fn test_batch_get_empty_short_circuits() {
        let conn = connection(MockTransport::new());
        let rs = Service::new(&conn, "t").unwrap();

        let reply = rs.batch_get(&[]).await.unwrap();
        assert_eq!(reply.code, 200);
        assert!(reply.data.is_empty());
        assert!(conn.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn test_stat() {
        let conn = connection(
            MockTransport::new()
                .reply(200, r#"{"hash":"h","fsize":12,"putTime":13217239400000000,"mimeType":"image/png"}"#),
        );
        let rs = Service::new(&conn, "t").unwrap();

        let entry = rs.stat("x:y").await.unwrap().data;
        assert_eq!(entry.fsize, 12);
        assert_eq!(entry.mime_type, "image/png");
        assert_eq!(conn.transport().last().uri, "http://rs.test/stat/t%3Ax%3Ay");
    }

    #[tokio::test]
    async fn test_management_calls() {
        let conn = connection(
            MockTransport::new()
                .reply(200, "")
                .reply(200, "")
                .reply(200, "")
                .reply(200, ""),
        );
        let rs = Service::new(&conn, "photos").unwrap();

        assert_eq!(rs.publish("cdn.example.com").await.unwrap(), 200);
        assert_eq!(rs.unpublish("cdn.example.com").await.unwrap(), 200);
        assert_eq!(rs.delete("a/b").await.unwrap(), 200);
        assert_eq!(rs.drop_table().await.unwrap(), 200);

        let uris: Vec<String> = conn.transport().requests().into_iter().map(|r| r.uri).collect();
        assert_eq!(
            uris,
            [
                "http://rs.test/publish/cdn.example.com/from/photos",
                "http://rs.test/unpublish/cdn.example.com",
                "http://rs.test/delete/photos%3Aa%2Fb",
                "http://rs.test/drop/photos",
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_missing_entry() {
        let conn = connection(MockTransport::new().reply(612, r#"{"error":"no such file or directory"}"#));
        let rs = Service::new(&conn, "t").unwrap();

        let err = rs.delete("ghost").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.code(), 612);
    }
}
