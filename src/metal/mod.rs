//! HTTP implementation of the device service against the Equinix Metal API.
//!
//! Every session builds its own `reqwest::Client` carrying the caller's API
//! token, so credentials from different clusters never share a connection
//! pool.

mod response;

use std::collections::HashSet;
use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::{ConfigError, MetalConfig};
use crate::device::{
    Device, DeviceCreateRequest, DeviceService, DeviceServiceError, ServiceFuture, SessionError,
    SessionProvider,
};
use crate::provider_spec::Secret;

pub use response::{DevicePage, classify_response};

const AUTH_HEADER: &str = "x-auth-token";
const API_PREFIX: &str = "/metal/v1";

/// Opens authenticated [`MetalDeviceService`] sessions.
#[derive(Clone, Debug)]
pub struct MetalSessionProvider {
    base_url: Url,
    timeout: Duration,
}

impl MetalSessionProvider {
    /// Constructs a provider from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the configuration fails
    /// validation and [`ConfigError::Parse`] when the API URL is not an
    /// absolute URL that can carry a path.
    pub fn new(config: &MetalConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let base_url = Url::parse(config.api_base())
            .map_err(|err| ConfigError::Parse(format!("invalid METAL_API_URL: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::Parse(format!(
                "invalid METAL_API_URL: {base_url} cannot carry a path"
            )));
        }
        Ok(Self {
            base_url,
            timeout: config.http_timeout(),
        })
    }
}

impl SessionProvider for MetalSessionProvider {
    type Service = MetalDeviceService;

    fn new_session(&self, secret: &Secret) -> Result<Self::Service, SessionError> {
        let token = secret.api_token();
        if token.is_empty() {
            return Err(SessionError::MissingToken);
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&token)
            .map_err(|err| SessionError::Client(err.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTH_HEADER, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .build()
            .map_err(|err| SessionError::Client(err.to_string()))?;

        Ok(MetalDeviceService {
            client,
            base_url: self.base_url.clone(),
        })
    }
}

/// Device service session bound to one API token.
#[derive(Clone, Debug)]
pub struct MetalDeviceService {
    client: Client,
    base_url: Url,
}

impl MetalDeviceService {
    /// Appends `segments` to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, DeviceServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                DeviceServiceError::Transport(format!("{} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(request: RequestBuilder) -> Result<(u16, String), DeviceServiceError> {
        let response = request
            .send()
            .await
            .map_err(|err| DeviceServiceError::Transport(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| DeviceServiceError::Transport(err.to_string()))?;
        Ok((status, body))
    }

    async fn fetch<T: DeserializeOwned>(
        request: RequestBuilder,
        resource: &str,
    ) -> Result<T, DeviceServiceError> {
        let (status, body) = Self::send(request).await?;
        classify_response(status, &body)?;
        serde_json::from_str(&body).map_err(|err| DeviceServiceError::Decode {
            resource: resource.to_owned(),
            message: err.to_string(),
        })
    }

    fn resolve_next(&self, href: &str) -> Result<Url, DeviceServiceError> {
        let parsed = if href.starts_with("http://") || href.starts_with("https://") {
            Url::parse(href)
        } else {
            // `meta.next.href` is rooted at the API prefix, e.g. `/metal/v1/projects/...`.
            let path = href.strip_prefix(API_PREFIX).unwrap_or(href);
            let base = self.base_url.as_str().trim_end_matches('/');
            Url::parse(&format!("{base}{path}"))
        };
        parsed.map_err(|err| DeviceServiceError::Decode {
            resource: String::from("device list"),
            message: format!("invalid next page link {href}: {err}"),
        })
    }
}

impl DeviceService for MetalDeviceService {
    fn list_project_devices<'a>(&'a self, project_id: &'a str) -> ServiceFuture<'a, Vec<Device>> {
        Box::pin(async move {
            let mut devices = Vec::new();
            let mut seen = HashSet::new();
            let mut next = Some(self.endpoint(&["projects", project_id, "devices"])?);
            while let Some(url) = next.take() {
                if !seen.insert(url.clone()) {
                    warn!(project_id, %url, "device list links back to a fetched page");
                    break;
                }
                let page: DevicePage =
                    Self::fetch(self.client.get(url), "device list").await?;
                debug!(
                    project_id,
                    page_size = page.devices.len(),
                    "fetched device page"
                );
                next = page
                    .next_href()
                    .map(|href| self.resolve_next(href))
                    .transpose()?;
                devices.extend(page.devices);
            }
            Ok(devices)
        })
    }

    fn get_device<'a>(&'a self, device_id: &'a str) -> ServiceFuture<'a, Device> {
        Box::pin(async move {
            let url = self.endpoint(&["devices", device_id])?;
            Self::fetch(self.client.get(url), "device").await
        })
    }

    fn create_device<'a>(
        &'a self,
        project_id: &'a str,
        request: &'a DeviceCreateRequest,
    ) -> ServiceFuture<'a, Device> {
        Box::pin(async move {
            let url = self.endpoint(&["projects", project_id, "devices"])?;
            Self::fetch(self.client.post(url).json(request), "device").await
        })
    }

    fn delete_device<'a>(&'a self, device_id: &'a str) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            let url = self.endpoint(&["devices", device_id])?;
            let request = self
                .client
                .delete(url)
                .query(&[("force_delete", "true")]);
            let (status, body) = Self::send(request).await?;
            classify_response(status, &body)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider_spec::{ALTERNATE_API_KEY, API_KEY};
    use rstest::rstest;
    use serde_json::{Value, json};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    fn provider() -> MetalSessionProvider {
        MetalSessionProvider::new(&MetalConfig {
            api_url: String::from("http://127.0.0.1:9/metal/v1/"),
            http_timeout_secs: 1,
        })
        .expect("config is valid")
    }

    fn session_for(api_url: &str) -> MetalDeviceService {
        MetalSessionProvider::new(&MetalConfig {
            api_url: api_url.to_owned(),
            http_timeout_secs: 5,
        })
        .expect("config is valid")
        .new_session(&Secret::new().with(API_KEY, "token"))
        .expect("session")
    }

    /// Answers one connection per canned response and hands back the raw
    /// requests once every response has been served.
    async fn serve(responses: Vec<(u16, String)>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
        let addr = listener.local_addr().expect("stub address");
        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().await.expect("accept");
                requests.push(read_request(&mut stream).await);
                let reply = format!(
                    "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(reply.as_bytes()).await.expect("write reply");
            }
            requests
        });
        (format!("http://{addr}/metal/v1"), handle)
    }

    async fn read_request(stream: &mut TcpStream) -> String {
        let mut raw = Vec::new();
        let mut chunk = [0_u8; 1024];
        loop {
            let read = stream.read(&mut chunk).await.expect("read request");
            if read == 0 {
                break;
            }
            raw.extend_from_slice(chunk.get(..read).unwrap_or_default());
            let text = String::from_utf8_lossy(&raw);
            if let Some((head, body)) = text.split_once("\r\n\r\n") {
                if body.len() >= content_length(head) {
                    return text.into_owned();
                }
            }
        }
        String::from_utf8_lossy(&raw).into_owned()
    }

    fn content_length(head: &str) -> usize {
        head.lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse().ok())
            .unwrap_or(0)
    }

    fn request_line(raw: &str) -> &str {
        raw.lines().next().unwrap_or_default()
    }

    fn page(ids: &[&str], next: Option<&str>) -> String {
        let devices: Vec<Value> = ids
            .iter()
            .map(|id| json!({"id": id, "hostname": format!("host-{id}")}))
            .collect();
        let next = next.map(|href| json!({"href": href}));
        json!({"devices": devices, "meta": {"next": next}}).to_string()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = MetalConfig::with_api_url("");
        assert!(matches!(
            MetalSessionProvider::new(&config),
            Err(ConfigError::MissingField(_))
        ));
    }

    #[rstest]
    #[case("not a url")]
    #[case("mailto:ops@example.com")]
    fn rejects_api_urls_without_a_path(#[case] api_url: &str) {
        let err = MetalSessionProvider::new(&MetalConfig::with_api_url(api_url))
            .expect_err("url is unusable");
        let ConfigError::Parse(message) = err else {
            panic!("expected Parse, got {err:?}");
        };
        assert!(message.contains("METAL_API_URL"), "message: {message}");
    }

    #[test]
    fn sessions_need_a_token() {
        let err = provider()
            .new_session(&Secret::new().with(API_KEY, "  "))
            .expect_err("blank token");
        assert_eq!(err, SessionError::MissingToken);
    }

    #[test]
    fn sessions_accept_alternate_token() {
        let session = provider()
            .new_session(&Secret::new().with(ALTERNATE_API_KEY, "token"))
            .expect("alternate key is accepted");
        let url = session.endpoint(&["devices", "1"]).expect("endpoint");
        assert_eq!(url.as_str(), "http://127.0.0.1:9/metal/v1/devices/1");
    }

    #[test]
    fn device_ids_are_encoded_as_one_segment() {
        let session = session_for("http://127.0.0.1:9/metal/v1");
        let url = session.endpoint(&["devices", "abc?x/y"]).expect("endpoint");
        assert_eq!(url.as_str(), "http://127.0.0.1:9/metal/v1/devices/abc%3Fx%2Fy");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn next_page_links_resolve_against_base() {
        let session = session_for("http://127.0.0.1:9/metal/v1/");
        let relative = session
            .resolve_next("/metal/v1/projects/p/devices?page=2")
            .expect("relative link");
        assert_eq!(
            relative.as_str(),
            "http://127.0.0.1:9/metal/v1/projects/p/devices?page=2"
        );
        let absolute = session
            .resolve_next("https://api.example.com/devices?page=3")
            .expect("absolute link");
        assert_eq!(absolute.as_str(), "https://api.example.com/devices?page=3");
    }

    #[tokio::test]
    async fn unreachable_api_is_a_transport_error() {
        let session = provider()
            .new_session(&Secret::new().with(API_KEY, "token"))
            .expect("session");
        let err = session
            .get_device("000001")
            .await
            .expect_err("nothing listens on the discard port");
        assert!(matches!(err, DeviceServiceError::Transport(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn list_follows_next_links_until_the_last_page() {
        let (base, server) = serve(vec![
            (200, page(&["000001"], Some("/metal/v1/projects/p/devices?page=2"))),
            (200, page(&["000002", "000003"], None)),
        ])
        .await;

        let devices = session_for(&base)
            .list_project_devices("p")
            .await
            .expect("list succeeds");
        let ids: Vec<&str> = devices.iter().map(|device| device.id.as_str()).collect();
        assert_eq!(ids, ["000001", "000002", "000003"]);

        let requests = server.await.expect("stub joins");
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests.iter().map(|raw| request_line(raw)).collect::<Vec<_>>(),
            [
                "GET /metal/v1/projects/p/devices HTTP/1.1",
                "GET /metal/v1/projects/p/devices?page=2 HTTP/1.1",
            ]
        );
        for raw in &requests {
            assert!(
                raw.to_ascii_lowercase().contains("x-auth-token: token"),
                "request: {raw}"
            );
        }
    }

    #[tokio::test]
    async fn list_stops_when_a_page_links_to_itself() {
        let (base, server) = serve(vec![(
            200,
            page(&["000001"], Some("/metal/v1/projects/p/devices")),
        )])
        .await;

        let devices = session_for(&base)
            .list_project_devices("p")
            .await
            .expect("list stops after the repeated page");
        assert_eq!(devices.len(), 1);
        assert_eq!(server.await.expect("stub joins").len(), 1);
    }

    #[tokio::test]
    async fn create_posts_the_device_payload() {
        let created = json!({
            "id": "000001",
            "hostname": "machine-0",
            "facility": {"code": "ewr1"},
            "state": "queued",
        });
        let (base, server) = serve(vec![(201, created.to_string())]).await;
        let request = DeviceCreateRequest {
            hostname: String::from("machine-0"),
            plan: String::from("c3.small.x86"),
            metro: String::from("ny"),
            operating_system: String::from("alpine_3.13"),
            tags: vec![String::from("kubernetes.io/cluster/shoot: 1")],
            ..DeviceCreateRequest::default()
        };

        let device = session_for(&base)
            .create_device("p", &request)
            .await
            .expect("create succeeds");
        assert_eq!(device.id, "000001");
        assert_eq!(device.location_code(), "ewr1");

        let requests = server.await.expect("stub joins");
        let raw = requests.first().expect("one request");
        assert_eq!(request_line(raw), "POST /metal/v1/projects/p/devices HTTP/1.1");
        let (_, body) = raw.split_once("\r\n\r\n").expect("request body");
        let sent: Value = serde_json::from_str(body).expect("json body");
        assert_eq!(sent["hostname"], "machine-0");
        assert_eq!(sent["plan"], "c3.small.x86");
        assert_eq!(sent["metro"], "ny");
        assert_eq!(sent["operating_system"], "alpine_3.13");
        assert!(sent.get("billing_cycle").is_none());
        assert!(sent.get("hardware_reservation_id").is_none());
    }

    #[tokio::test]
    async fn delete_forces_removal_and_reports_missing_devices() {
        let (base, server) =
            serve(vec![(404, String::from(r#"{"errors":["Not found"]}"#))]).await;

        let err = session_for(&base)
            .delete_device("000001")
            .await
            .expect_err("device is gone");
        assert_eq!(
            err,
            DeviceServiceError::NotFound {
                status: 404,
                message: String::from("Not found"),
            }
        );

        let requests = server.await.expect("stub joins");
        assert_eq!(
            requests.first().map(|raw| request_line(raw)),
            Some("DELETE /metal/v1/devices/000001?force_delete=true HTTP/1.1")
        );
    }

    #[tokio::test]
    async fn get_keeps_query_characters_inside_the_path() {
        let (base, server) =
            serve(vec![(404, String::from(r#"{"errors":["Not found"]}"#))]).await;

        let err = session_for(&base)
            .get_device("abc?x")
            .await
            .expect_err("device is unknown");
        assert!(err.is_not_found(), "got {err:?}");

        let requests = server.await.expect("stub joins");
        assert_eq!(
            requests.first().map(|raw| request_line(raw)),
            Some("GET /metal/v1/devices/abc%3Fx HTTP/1.1")
        );
    }
}
