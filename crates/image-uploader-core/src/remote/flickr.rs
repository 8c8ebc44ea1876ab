use log::{debug, info};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::blocking::{multipart::Form, Client};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::oauth::OAuthCredentials;
use super::{PhotoService, UploadParams};
use crate::config::Config;
use crate::error::{Error, Result};

const UPLOAD_URL: &str = "https://up.flickr.com/services/upload/";
const REST_URL: &str = "https://api.flickr.com/services/rest/";

/// Page showing a single photo
pub fn photo_url(username: &str, photo_id: &str) -> String {
    format!("https://www.flickr.com/photos/{}/{}", username, photo_id)
}

/// The account's photostream
pub fn profile_url(username: &str) -> String {
    format!("https://www.flickr.com/photos/{}", username)
}

/// Flickr's bulk editor for the given photos
pub fn edit_url(photo_ids: &[String]) -> String {
    format!(
        "https://www.flickr.com/photos/upload/edit/?ids={}",
        photo_ids.join(",")
    )
}

/// [`PhotoService`] talking to the Flickr API
pub struct FlickrClient {
    http: Client,
    credentials: OAuthCredentials,
    upload_url: String,
    rest_url: String,
}

impl FlickrClient {
    pub fn new(credentials: OAuthCredentials, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("image-uploader/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            credentials,
            upload_url: UPLOAD_URL.to_string(),
            rest_url: REST_URL.to_string(),
        })
    }

    /// Build from the `flickr` and `upload` sections of the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate_credentials()?;
        Self::new(
            OAuthCredentials::from(&config.flickr),
            Duration::from_secs(config.upload.http_timeout_secs),
        )
    }

    /// Send requests somewhere other than flickr.com
    pub fn with_endpoints(
        mut self,
        upload_url: impl Into<String>,
        rest_url: impl Into<String>,
    ) -> Self {
        self.upload_url = upload_url.into();
        self.rest_url = rest_url.into();
        self
    }

    /// Call a REST API method that returns nothing of interest
    fn call(&self, method: &str, params: &[(&str, &str)]) -> Result<()> {
        let remote_error = |message: String| Error::Remote {
            method: method.to_string(),
            message,
        };

        let mut request: Vec<(String, String)> = vec![
            ("method".to_string(), method.to_string()),
            ("format".to_string(), "json".to_string()),
            ("nojsoncallback".to_string(), "1".to_string()),
        ];
        request.extend(params.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let signed = self.credentials.sign_now("POST", &self.rest_url, &request)?;
        debug!("Calling {}", method);

        let response = self
            .http
            .post(&self.rest_url)
            .form(&signed)
            .send()
            .map_err(|e| remote_error(e.to_string()))?;
        let status = response.status();
        let body = response.text().map_err(|e| remote_error(e.to_string()))?;

        if !status.is_success() {
            return Err(remote_error(format!("HTTP {}: {}", status, body.trim())));
        }

        parse_rest_response(&body).map_err(remote_error)
    }
}

fn flag(value: bool) -> String {
    let flag = if value { "1" } else { "0" };
    flag.to_string()
}

impl PhotoService for FlickrClient {
    fn upload(&self, path: &Path, params: &UploadParams) -> Result<String> {
        let mut fields: Vec<(String, String)> = vec![("title".to_string(), params.title.clone())];
        if !params.description.is_empty() {
            fields.push(("description".to_string(), params.description.clone()));
        }
        fields.extend([
            ("tags".to_string(), params.tags.join(" ")),
            ("is_public".to_string(), flag(params.is_public)),
            ("is_friend".to_string(), flag(params.is_friend)),
            ("is_family".to_string(), flag(params.is_family)),
            ("safety_level".to_string(), (params.safety_level as u8).to_string()),
            // 1 = photo
            ("content_type".to_string(), "1".to_string()),
            // 1 = shown in public searches, 2 = hidden
            ("hidden".to_string(), if params.hidden { "2" } else { "1" }.to_string()),
        ]);

        // The file itself is not part of the signature
        let signed = self.credentials.sign_now("POST", &self.upload_url, &fields)?;
        let form = signed
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value))
            .file("photo", path)
            .map_err(|e| Error::Upload(format!("Unable to read {}: {}", path.display(), e)))?;

        info!("Uploading {} as '{}'", path.display(), params.title);
        let response = self
            .http
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .map_err(|e| Error::Upload(e.to_string()))?;
        let status = response.status();
        let body = response.text().map_err(|e| Error::Upload(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Upload(format!("HTTP {}: {}", status, body.trim())));
        }

        parse_upload_response(&body).map_err(Error::Upload)
    }

    fn set_date_posted(&self, photo_id: &str, date_posted: i64) -> Result<()> {
        let date_posted = date_posted.to_string();
        self.call(
            "flickr.photos.setDates",
            &[("photo_id", photo_id), ("date_posted", &date_posted)],
        )
    }

    fn add_to_album(&self, album_id: &str, photo_id: &str) -> Result<()> {
        self.call(
            "flickr.photosets.addPhoto",
            &[("photoset_id", album_id), ("photo_id", photo_id)],
        )
    }
}

#[derive(Debug, Deserialize)]
struct RestResponse {
    stat: String,
    code: Option<i64>,
    message: Option<String>,
}

/// Check a JSON REST response for `"stat": "ok"`
fn parse_rest_response(body: &str) -> std::result::Result<(), String> {
    let response: RestResponse = serde_json::from_str(body)
        .map_err(|e| format!("Unexpected response ({}): {}", e, body.trim()))?;

    if response.stat == "ok" {
        return Ok(());
    }

    Err(format!(
        "{} (code {})",
        response.message.unwrap_or_else(|| "unknown error".to_string()),
        response.code.unwrap_or_default()
    ))
}

/// Extract the photo id from the upload endpoint's XML response
fn parse_upload_response(body: &str) -> std::result::Result<String, String> {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    let mut in_photo_id = false;
    let mut photo_id = String::new();
    let mut failure = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"photoid" => in_photo_id = true,
            Ok(Event::End(e)) if e.name().as_ref() == b"photoid" => in_photo_id = false,
            Ok(Event::Text(text)) if in_photo_id => {
                let text = text
                    .unescape()
                    .map_err(|e| format!("Unexpected response ({})", e))?;
                photo_id.push_str(&text);
            }
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"err" => {
                let message = attribute_value(&e, b"msg")?.unwrap_or_default();
                let code = attribute_value(&e, b"code")?.unwrap_or_default();
                failure = Some(format!("{} (code {})", message, code));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(format!("Unexpected response ({})", e)),
        }
    }

    let photo_id = photo_id.trim();
    if !photo_id.is_empty() {
        return Ok(photo_id.to_string());
    }
    Err(failure.unwrap_or_else(|| format!("Unexpected response: {}", body.trim())))
}

fn attribute_value(
    element: &BytesStart,
    name: &[u8],
) -> std::result::Result<Option<String>, String> {
    let attribute = element
        .try_get_attribute(name)
        .map_err(|e| format!("Unexpected response ({})", e))?;
    match attribute {
        Some(attribute) => attribute
            .unescape_value()
            .map(|value| Some(value.into_owned()))
            .map_err(|e| format!("Unexpected response ({})", e)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    /// Accept one HTTP request, answer with `body`, and hand back the raw request
    fn serve_once(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            request
        });

        (url, handle)
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&data).into_owned();
            let Some(header_end) = text.find("\r\n\r\n") else {
                continue;
            };
            let headers = text[..header_end].to_lowercase();
            if headers.contains("transfer-encoding: chunked") {
                if text.ends_with("0\r\n\r\n") {
                    break;
                }
                continue;
            }
            let length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if data.len() >= header_end + 4 + length {
                break;
            }
        }
        String::from_utf8_lossy(&data).into_owned()
    }

    fn client(url: &str) -> FlickrClient {
        let credentials = OAuthCredentials {
            consumer_key: "key".into(),
            consumer_secret: "secret".into(),
            token: "token".into(),
            token_secret: "token-secret".into(),
        };
        FlickrClient::new(credentials, Duration::from_secs(10))
            .unwrap()
            .with_endpoints(url, url)
    }

    #[test]
    fn test_upload_sends_signed_multipart_and_returns_id() {
        let (url, server) = serve_once(
            "200 OK",
            "<?xml version=\"1.0\" encoding=\"utf-8\" ?>\n<rsp stat=\"ok\">\n<photoid>49212345678</photoid>\n</rsp>\n",
        );
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("IMG_1.jpg");
        std::fs::write(&image, b"DUMMY IMAGE DATA").unwrap();

        let params = UploadParams::new("IMG_1", "", &["family".to_string()]);
        let photo_id = client(&url).upload(&image, &params).unwrap();
        assert_eq!(photo_id, "49212345678");

        let request = server.join().unwrap();
        assert!(request.starts_with("POST / HTTP/1.1"));
        assert!(request.contains("name=\"title\"\r\n\r\nIMG_1\r\n"));
        assert!(request.contains("name=\"tags\"\r\n\r\n\"family\"\r\n"));
        assert!(request.contains("name=\"oauth_signature\""));
        assert!(request.contains("name=\"photo\"; filename=\"IMG_1.jpg\""));
        assert!(request.contains("DUMMY IMAGE DATA"));
        // No description field when the image has none
        assert!(!request.contains("name=\"description\""));
    }

    #[test]
    fn test_upload_error_response() {
        let (url, server) = serve_once(
            "200 OK",
            "<rsp stat=\"fail\">\n<err code=\"98\" msg=\"Invalid auth token\" />\n</rsp>",
        );
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("IMG_1.jpg");
        std::fs::write(&image, b"DUMMY IMAGE DATA").unwrap();

        let result = client(&url).upload(&image, &UploadParams::new("IMG_1", "", &[]));
        match result {
            Err(Error::Upload(message)) => {
                assert_eq!(message, "Invalid auth token (code 98)")
            }
            other => panic!("unexpected result: {:?}", other),
        }
        server.join().unwrap();
    }

    #[test]
    fn test_upload_of_missing_file_fails_before_sending() {
        let result = client("http://127.0.0.1:9/").upload(
            Path::new("/nonexistent/IMG_1.jpg"),
            &UploadParams::new("IMG_1", "", &[]),
        );
        assert!(matches!(result, Err(Error::Upload(_))));
    }

    #[test]
    fn test_add_to_album_posts_rest_call() {
        let (url, server) = serve_once("200 OK", "{\"stat\":\"ok\"}");

        client(&url).add_to_album("72157", "49212345678").unwrap();

        let request = server.join().unwrap();
        assert!(request.contains("method=flickr.photosets.addPhoto"));
        assert!(request.contains("photoset_id=72157"));
        assert!(request.contains("photo_id=49212345678"));
        assert!(request.contains("oauth_signature="));
    }

    #[test]
    fn test_set_date_posted_failure_is_remote_error() {
        let (url, server) = serve_once(
            "200 OK",
            "{\"stat\":\"fail\",\"code\":1,\"message\":\"Photo not found\"}",
        );

        let result = client(&url).set_date_posted("1", 1592146999);
        match result {
            Err(Error::Remote { method, message }) => {
                assert_eq!(method, "flickr.photos.setDates");
                assert_eq!(message, "Photo not found (code 1)");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(server.join().unwrap().contains("date_posted=1592146999"));
    }

    #[test]
    fn test_http_error_status_is_reported() {
        let (url, server) = serve_once("503 Service Unavailable", "try later");

        let result = client(&url).add_to_album("1", "2");
        match result {
            Err(Error::Remote { message, .. }) => assert!(message.contains("503")),
            other => panic!("unexpected result: {:?}", other),
        }
        server.join().unwrap();
    }

    #[test]
    fn test_parse_upload_response_with_attributes() {
        let body = "<rsp stat=\"ok\"><photoid secret=\"abc\" originalsecret=\"def\">123</photoid></rsp>";
        assert_eq!(parse_upload_response(body), Ok("123".to_string()));
        assert!(parse_upload_response("<html>gateway timeout</html>").is_err());
    }

    #[test]
    fn test_parse_upload_response_ignores_photoid_lookalikes() {
        let body = "<rsp stat=\"ok\">\n  <!-- <photoid>999</photoid> -->\n  <photoid>\n    456\n  </photoid>\n</rsp>";
        assert_eq!(parse_upload_response(body), Ok("456".to_string()));
    }

    #[test]
    fn test_parse_upload_response_rejects_malformed_xml() {
        let result = parse_upload_response("<rsp stat=\"ok\"><photoid>1</rsp>");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_upload_error_unescapes_message() {
        let body = "<rsp stat=\"fail\"><err code=\"5\" msg=\"Filetype was not recognised &amp; rejected\" /></rsp>";
        assert_eq!(
            parse_upload_response(body),
            Err("Filetype was not recognised & rejected (code 5)".to_string())
        );
    }

    #[test]
    fn test_urls() {
        assert_eq!(photo_url("someone", "42"), "https://www.flickr.com/photos/someone/42");
        assert_eq!(profile_url("someone"), "https://www.flickr.com/photos/someone");
        assert_eq!(
            edit_url(&["1".to_string(), "2".to_string()]),
            "https://www.flickr.com/photos/upload/edit/?ids=1,2"
        );
    }
}
