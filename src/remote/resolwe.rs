//! HTTP client for a Resolwe server.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::http_client;

use super::query::{DataQuery, SampleQuery};
use super::types::{
    Collection, CollectionId, DataId, DataObject, Job, JobSubmission, Sample, SampleId,
    UploadedFile,
};
use super::wire::{CollectionWire, DataWire, ListWire, SampleWire};
use super::{RemoteError, RemoteJobClient};

const LOGIN_PATH: &str = "rest-auth/login/";
const UPLOAD_PATH: &str = "upload/";
const MAX_JSON_BYTES: usize = 16 * 1024 * 1024;
const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;
const UPLOAD_CHUNK_BYTES: usize = 8 * 1024 * 1024;
const MAX_LIST_PAGES: usize = 1000;

/// Login details for a Resolwe server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Session {
    session_id: String,
    csrf_token: Option<String>,
}

/// Authenticated connection to a Resolwe server.
///
/// The session is established once in [`ResolweClient::connect`] and replayed
/// on every request; there is no ambient connection state.
pub struct ResolweClient {
    base: Url,
    session: Session,
}

impl ResolweClient {
    /// Log in to `server` and return a client bound to that session.
    pub fn connect(server: &str, credentials: &Credentials) -> Result<Self, RemoteError> {
        let base = parse_base_url(server)?;
        let session = login(&base, credentials)?;
        tracing::info!("Connected to {} as {}", base, credentials.username);
        Ok(Self { base, session })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        self.base.join(path).map_err(|err| RemoteError::InvalidUrl {
            url: format!("{}{path}", self.base),
            reason: err.to_string(),
        })
    }

    fn request(&self, method: &str, url: &Url) -> ureq::Request {
        let mut cookie = format!("sessionid={}", self.session.session_id);
        let mut request = http_client::agent()
            .request(method, url.as_str())
            .set("Accept", "application/json")
            .set("Referer", self.base.as_str());
        if let Some(token) = &self.session.csrf_token {
            cookie.push_str(&format!("; csrftoken={token}"));
            request = request.set("X-CSRFToken", token);
        }
        request.set("Cookie", &cookie)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, RemoteError> {
        let response = send(self.request("GET", url), None::<&()>)?;
        decode(response)
    }

    fn post_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        body: &impl Serialize,
    ) -> Result<T, RemoteError> {
        let response = send(self.request("POST", url), Some(body))?;
        decode(response)
    }

    /// Every item of a list endpoint, following `next` links across pages.
    fn list<T: DeserializeOwned>(&self, url: &Url) -> Result<Vec<T>, RemoteError> {
        let mut items = Vec::new();
        let mut page_url = url.clone();
        for _ in 0..MAX_LIST_PAGES {
            let (page, next) = self.get_json::<ListWire<T>>(&page_url)?.into_page();
            items.extend(page);
            let Some(next) = next else {
                return Ok(items);
            };
            page_url = self.base.join(&next).map_err(|err| RemoteError::InvalidUrl {
                url: next.clone(),
                reason: err.to_string(),
            })?;
        }
        Err(RemoteError::Decode(format!(
            "{url} returned more than {MAX_LIST_PAGES} pages"
        )))
    }

    fn data_url(&self, query: &DataQuery) -> Result<Url, RemoteError> {
        let mut url = self.endpoint("api/data")?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(id) = query.id {
                pairs.append_pair("id", &id.to_string());
            }
            if let Some(parent) = query.parent {
                pairs.append_pair("parents", &parent.to_string());
            }
            if let Some(prefix) = &query.type_prefix {
                pairs.append_pair("type", prefix);
            }
            if let Some(sample) = query.sample {
                pairs.append_pair("entity", &sample.to_string());
            }
            if let Some(slug) = &query.slug {
                pairs.append_pair("slug", slug);
            }
        }
        Ok(url)
    }

    fn attached_sample(&self, data: &DataWire) -> Result<Option<SampleId>, RemoteError> {
        let samples = self.samples(&SampleQuery::ForData(DataId(data.id)))?;
        Ok(samples.first().map(|sample| sample.id))
    }
}

impl RemoteJobClient for ResolweClient {
    fn submit(&self, submission: &JobSubmission) -> Result<Job, RemoteError> {
        let url = self.endpoint("api/data")?;
        let wire: DataWire = self.post_json(&url, submission)?;
        let job = wire.into_job();
        tracing::info!("Submitted {} as job {}", submission.process, job.id);
        Ok(job)
    }

    fn refresh(&self, job: &mut Job) -> Result<(), RemoteError> {
        let url = self.endpoint(&format!("api/data/{}", job.id))?;
        let wire: DataWire = self.get_json(&url)?;
        let fresh = wire.into_job();
        job.status = fresh.status;
        if !fresh.type_tag.is_empty() {
            job.type_tag = fresh.type_tag;
        }
        if !fresh.parents.is_empty() {
            job.parents = fresh.parents;
        }
        Ok(())
    }

    fn data(&self, query: &DataQuery) -> Result<Vec<DataObject>, RemoteError> {
        let url = self.data_url(query)?;
        let mut objects = Vec::new();
        for wire in self.list::<DataWire>(&url)? {
            let sample = match query.sample {
                Some(sample) => Some(sample),
                None => self.attached_sample(&wire)?,
            };
            let mut object = wire.into_object(sample);
            if let Some(parent) = query.parent {
                if !object.parents.contains(&parent) {
                    object.parents.push(parent);
                }
            }
            objects.push(object);
        }
        Ok(objects)
    }

    fn samples(&self, query: &SampleQuery) -> Result<Vec<Sample>, RemoteError> {
        let samples = match query {
            SampleQuery::ById(id) => {
                let url = self.endpoint(&format!("api/sample/{id}"))?;
                match self.get_json::<SampleWire>(&url) {
                    Ok(sample) => vec![sample],
                    Err(RemoteError::NotFound(_)) => Vec::new(),
                    Err(err) => return Err(err),
                }
            }
            SampleQuery::InCollection(collection) => {
                let mut url = self.endpoint("api/sample")?;
                url.query_pairs_mut()
                    .append_pair("collections", &collection.to_string());
                self.list::<SampleWire>(&url)?
            }
            SampleQuery::ForData(data) => {
                let mut url = self.endpoint("api/sample")?;
                url.query_pairs_mut().append_pair("data", &data.to_string());
                self.list::<SampleWire>(&url)?
            }
        };
        Ok(samples.into_iter().map(Sample::from).collect())
    }

    fn collections(&self, name: &str) -> Result<Vec<Collection>, RemoteError> {
        let mut url = self.endpoint("api/collection")?;
        url.query_pairs_mut().append_pair("name", name);
        let found = self.list::<CollectionWire>(&url)?;
        // The name filter may be fuzzy server side; the resolution key is the exact name.
        Ok(found
            .into_iter()
            .map(Collection::from)
            .filter(|collection| collection.name == name)
            .collect())
    }

    fn create_collection(&self, name: &str) -> Result<Collection, RemoteError> {
        let url = self.endpoint("api/collection")?;
        let wire: CollectionWire = self.post_json(&url, &json!({ "name": name }))?;
        Ok(Collection::from(wire))
    }

    fn add_samples(
        &self,
        collection: CollectionId,
        samples: &[SampleId],
    ) -> Result<(), RemoteError> {
        if samples.is_empty() {
            return Ok(());
        }
        let url = self.endpoint(&format!("api/collection/{collection}/add_samples"))?;
        send(self.request("POST", &url), Some(&json!({ "ids": samples })))?;
        Ok(())
    }

    fn upload_file(&self, path: &Path) -> Result<UploadedFile, RemoteError> {
        let io_error = |source| RemoteError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| RemoteError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name"),
            })?
            .to_string();
        let mut file = File::open(path).map_err(io_error)?;
        let total = file.metadata().map_err(io_error)?.len();
        let file_uid = uuid::Uuid::new_v4().to_string();
        let url = self.endpoint(UPLOAD_PATH)?;

        let mut buf = vec![0u8; UPLOAD_CHUNK_BYTES];
        let mut offset = 0u64;
        loop {
            let read = read_chunk(&mut file, &mut buf).map_err(io_error)?;
            if read == 0 && offset > 0 {
                break;
            }
            let end = (offset + read as u64).saturating_sub(1);
            let request = self
                .request("POST", &url)
                .set("Content-Type", "application/octet-stream")
                .set(
                    "Content-Disposition",
                    &format!("attachment; filename=\"{file_name}\""),
                )
                .set("Content-Range", &format!("bytes {offset}-{end}/{total}"))
                .set("Session-Id", &self.session.session_id)
                .set("X-File-Uuid", &file_uid);
            map_call(request.send_bytes(&buf[..read]))?;
            offset += read as u64;
            if read == 0 || offset >= total {
                break;
            }
        }
        tracing::info!("Uploaded {} ({} bytes)", path.display(), total);
        Ok(UploadedFile {
            file: file_name,
            file_temp: file_uid,
        })
    }
}

fn read_chunk(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let read = file.read(&mut buf[filled..])?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

fn parse_base_url(server: &str) -> Result<Url, RemoteError> {
    let trimmed = server.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash).map_err(|err| RemoteError::InvalidUrl {
        url: server.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(RemoteError::InvalidUrl {
            url: server.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

fn login(base: &Url, credentials: &Credentials) -> Result<Session, RemoteError> {
    let url = base.join(LOGIN_PATH).map_err(|err| RemoteError::InvalidUrl {
        url: base.to_string(),
        reason: err.to_string(),
    })?;
    let body = json!({
        "username": credentials.username,
        "password": credentials.password,
    });
    let request = http_client::agent()
        .post(url.as_str())
        .set("Accept", "application/json")
        .set("Referer", base.as_str());
    let response = match send(request, Some(&body)) {
        Ok(response) => response,
        Err(RemoteError::Status { code, body }) if matches!(code, 400 | 401 | 403) => {
            return Err(RemoteError::Auth(format!("HTTP {code}: {body}")));
        }
        Err(err) => return Err(err),
    };
    session_from_cookies(response.all("Set-Cookie"))
}

fn session_from_cookies(headers: Vec<&str>) -> Result<Session, RemoteError> {
    let mut session_id = None;
    let mut csrf_token = None;
    for header in headers {
        let Some((name, value)) = header
            .split(';')
            .next()
            .and_then(|pair| pair.split_once('='))
        else {
            continue;
        };
        match name.trim() {
            "sessionid" => session_id = Some(value.trim().to_string()),
            "csrftoken" => csrf_token = Some(value.trim().to_string()),
            _ => {}
        }
    }
    let session_id = session_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| RemoteError::Auth("Server did not issue a session cookie".into()))?;
    Ok(Session {
        session_id,
        csrf_token,
    })
}

fn send<B: Serialize + ?Sized>(
    request: ureq::Request,
    body: Option<&B>,
) -> Result<ureq::Response, RemoteError> {
    let result = match body {
        Some(body) => request.send_json(body),
        None => request.call(),
    };
    map_call(result)
}

fn map_call(result: Result<ureq::Response, ureq::Error>) -> Result<ureq::Response, RemoteError> {
    match result {
        Ok(response) => Ok(response),
        Err(ureq::Error::Status(code, response)) => {
            let body = http_client::read_text_limited(response, MAX_ERROR_BODY_BYTES)
                .unwrap_or_else(|err| err);
            Err(map_status_error(code, body))
        }
        Err(ureq::Error::Transport(err)) => Err(RemoteError::Transport(err.to_string())),
    }
}

fn map_status_error(code: u16, body: String) -> RemoteError {
    match code {
        404 => RemoteError::NotFound(body),
        409 => RemoteError::Conflict(body),
        _ => RemoteError::Status { code, body },
    }
}

fn decode<T: DeserializeOwned>(response: ureq::Response) -> Result<T, RemoteError> {
    http_client::read_json_limited(response, MAX_JSON_BYTES)
        .map_err(|err| RemoteError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::{CollectionResolver, ResolveError};
    use crate::http_client::test_server::{json_response, serve};
    use crate::remote::JobStatus;

    fn login_response() -> String {
        json_response(
            "200 OK",
            r#"{"key": "ignored"}"#,
            &[
                "Set-Cookie: csrftoken=tok123; Path=/",
                "Set-Cookie: sessionid=sess456; HttpOnly; Path=/",
            ],
        )
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "admin".into(),
            password: "secret".into(),
        }
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = parse_base_url("http://localhost:8000").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/");
        assert_eq!(
            url.join("api/data").unwrap().as_str(),
            "http://localhost:8000/api/data"
        );
    }

    #[test]
    fn base_url_rejects_other_schemes() {
        let err = parse_base_url("ftp://example.invalid").unwrap_err();
        assert!(matches!(err, RemoteError::InvalidUrl { .. }));
    }

    #[test]
    fn session_cookies_are_extracted() {
        let session = session_from_cookies(vec![
            "csrftoken=abc; expires=Thu, 01 Jan 2099 00:00:00 GMT; Path=/",
            "sessionid=xyz; HttpOnly",
        ])
        .unwrap();
        assert_eq!(session.session_id, "xyz");
        assert_eq!(session.csrf_token.as_deref(), Some("abc"));
    }

    #[test]
    fn missing_session_cookie_is_auth_error() {
        let err = session_from_cookies(vec!["csrftoken=abc"]).unwrap_err();
        assert!(matches!(err, RemoteError::Auth(_)));
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        assert!(matches!(map_status_error(404, String::new()), RemoteError::NotFound(_)));
        assert!(matches!(map_status_error(409, String::new()), RemoteError::Conflict(_)));
        assert!(matches!(
            map_status_error(500, "boom".into()),
            RemoteError::Status { code: 500, .. }
        ));
    }

    #[test]
    fn rejected_login_is_auth_error() {
        let (url, _requests) = serve(vec![json_response(
            "400 Bad Request",
            r#"{"non_field_errors": ["Unable to log in"]}"#,
            &[],
        )]);
        let err = ResolweClient::connect(&url, &credentials()).err().unwrap();
        assert!(matches!(err, RemoteError::Auth(_)), "{err}");
    }

    #[test]
    fn refresh_replays_session_and_updates_status() {
        let (url, requests) = serve(vec![
            login_response(),
            json_response(
                "200 OK",
                r#"{"id": 9, "status": "OK", "process_type": "data:demultiplex:icount:"}"#,
                &[],
            ),
        ]);
        let client = ResolweClient::connect(&url, &credentials()).unwrap();
        let login_request = requests.recv().unwrap();
        assert!(login_request.starts_with("POST /rest-auth/login/"));
        assert!(login_request.contains("\"username\":\"admin\""));

        let mut job = Job {
            id: DataId(9),
            status: JobStatus::Pending,
            type_tag: String::new(),
            parents: Vec::new(),
            input: Default::default(),
        };
        client.refresh(&mut job).unwrap();
        assert_eq!(job.status, JobStatus::Ok);
        assert_eq!(job.type_tag, "data:demultiplex:icount:");

        let refresh_request = requests.recv().unwrap().to_ascii_lowercase();
        assert!(refresh_request.starts_with("get /api/data/9"));
        assert!(refresh_request.contains("sessionid=sess456"));
        assert!(refresh_request.contains("x-csrftoken: tok123"));
    }

    #[test]
    fn collections_keep_exact_name_matches_only() {
        let (url, requests) = serve(vec![
            login_response(),
            json_response(
                "200 OK",
                r#"[{"id": 1, "name": "exp1"}, {"id": 2, "name": "exp10"}]"#,
                &[],
            ),
        ]);
        let client = ResolweClient::connect(&url, &credentials()).unwrap();
        let found = client.collections("exp1").unwrap();
        assert_eq!(
            found,
            vec![Collection {
                id: CollectionId(1),
                name: "exp1".into()
            }]
        );
        let _login = requests.recv().unwrap();
        let query = requests.recv().unwrap();
        assert!(query.starts_with("GET /api/collection?name=exp1"));
    }

    #[test]
    fn paged_duplicates_stay_visible_to_resolution() {
        let (url, requests) = serve(vec![
            login_response(),
            json_response(
                "200 OK",
                r#"{"count": 2, "next": "/api/collection?name=exp1&offset=1", "results": [{"id": 1, "name": "exp1"}]}"#,
                &[],
            ),
            json_response(
                "200 OK",
                r#"{"count": 2, "next": null, "results": [{"id": 7, "name": "exp1"}]}"#,
                &[],
            ),
        ]);
        let client = ResolweClient::connect(&url, &credentials()).unwrap();
        let err = CollectionResolver::new(&client).resolve("exp1").unwrap_err();
        let ResolveError::Ambiguous { count, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(*count, 2);

        let _login = requests.recv().unwrap();
        let first = requests.recv().unwrap();
        assert!(first.starts_with("GET /api/collection?name=exp1 "));
        let second = requests.recv().unwrap();
        assert!(second.starts_with("GET /api/collection?name=exp1&offset=1 "));
    }

    #[test]
    fn paged_samples_are_concatenated() {
        let (url, _requests) = serve(vec![
            login_response(),
            json_response(
                "200 OK",
                r#"{"next": "/api/sample?collections=3&offset=1", "results": [{"id": 1}]}"#,
                &[],
            ),
            json_response("200 OK", r#"{"next": null, "results": [{"id": 2}]}"#, &[]),
        ]);
        let client = ResolweClient::connect(&url, &credentials()).unwrap();
        let samples = client
            .samples(&SampleQuery::InCollection(CollectionId(3)))
            .unwrap();
        let ids: Vec<SampleId> = samples.iter().map(|sample| sample.id).collect();
        assert_eq!(ids, vec![SampleId(1), SampleId(2)]);
    }

    #[test]
    fn create_conflict_surfaces_as_conflict() {
        let (url, _requests) = serve(vec![
            login_response(),
            json_response("409 Conflict", r#"{"detail": "exists"}"#, &[]),
        ]);
        let client = ResolweClient::connect(&url, &credentials()).unwrap();
        let err = client.create_collection("exp1").unwrap_err();
        assert!(matches!(err, RemoteError::Conflict(_)));
    }

    #[test]
    fn upload_sends_single_chunk_with_range_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.fastq");
        std::fs::write(&path, b"@r1\nACGT\n+\nIIII\n").unwrap();
        let (url, requests) = serve(vec![login_response(), json_response("200 OK", "{}", &[])]);
        let client = ResolweClient::connect(&url, &credentials()).unwrap();

        let uploaded = client.upload_file(&path).unwrap();
        assert_eq!(uploaded.file, "reads.fastq");
        assert!(!uploaded.file_temp.is_empty());

        let _login = requests.recv().unwrap();
        let upload = requests.recv().unwrap().to_ascii_lowercase();
        assert!(upload.starts_with("post /upload/"));
        assert!(upload.contains("content-range: bytes 0-15/16"));
        assert!(upload.contains("session-id: sess456"));
        assert!(upload.contains(&format!("x-file-uuid: {}", uploaded.file_temp)));
    }
}
