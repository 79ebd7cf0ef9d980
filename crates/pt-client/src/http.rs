//! [`TourBackend`] over the tour server's JSON/multipart HTTP API.
//!
//! | call          | request                                   | response            |
//! |---------------|-------------------------------------------|---------------------|
//! | list          | `GET  /tour`                              | `{ id: tour, .. }`  |
//! | save          | `POST /tour` (tour fields plus `_id`)     | ignored             |
//! | upload        | `POST /uploadImage` etc., multipart       | resource URL        |
//! | depth         | `POST /depth` (panorama URL as JSON)      | `{ data: [[..]] }`  |

use crate::backend::{ResourceKind, TourBackend, Upload};
use crate::config::ClientConfig;
use crate::error::{PersistError, Result};
use pt_core::{DepthMap, ResourceRef, TourGraph, TourId, TourMap};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    config: ClientConfig,
}

/// Save body: the tour document with its id folded in.
#[derive(Serialize)]
struct SaveBody<'a> {
    #[serde(flatten)]
    tour: &'a TourGraph,
    #[serde(rename = "_id")]
    id: TourId,
}

#[derive(Deserialize)]
struct DepthResponse {
    data: DepthMap,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

fn upload_route(kind: ResourceKind) -> (&'static str, &'static str) {
    match kind {
        ResourceKind::Image => ("uploadImage", "image"),
        ResourceKind::Video => ("uploadVideo", "video"),
        ResourceKind::Raw => ("uploadRaw", "file"),
    }
}

/// The upload endpoint answers with the URL either as a JSON string or as
/// plain text.
fn parse_resource(body: &str) -> ResourceRef {
    match serde_json::from_str::<String>(body) {
        Ok(url) => ResourceRef::new(url),
        Err(_) => ResourceRef::new(body.trim()),
    }
}

/// Decode a `GET /tour` body one tour at a time. A malformed tour is
/// logged and skipped instead of failing the whole list.
pub fn decode_tour_list(body: &str) -> Result<TourMap> {
    let entries: HashMap<String, serde_json::Value> = serde_json::from_str(body)?;
    let mut tours = TourMap::new();
    for (key, value) in entries {
        let id = match TourId::new(&key) {
            Ok(id) => id,
            Err(err) => {
                log::warn!("skipping tour with bad id: {err}");
                continue;
            }
        };
        match serde_json::from_value::<TourGraph>(value) {
            Ok(tour) => {
                tours.insert(id, Arc::new(tour));
            }
            Err(err) => log::warn!("skipping malformed tour `{id}`: {err}"),
        }
    }
    Ok(tours)
}

fn check_status(endpoint: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(PersistError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        })
    }
}

impl TourBackend for HttpBackend {
    async fn fetch_tours(&self) -> Result<TourMap> {
        let url = self.config.endpoint("tour");
        let response = check_status(&url, self.client.get(&url).send().await?)?;
        decode_tour_list(&response.text().await?)
    }

    async fn put_tour(&self, id: TourId, tour: &TourGraph) -> Result<()> {
        let url = self.config.endpoint("tour");
        let body = serde_json::to_vec(&SaveBody { tour, id })?;
        log::debug!("saving tour `{id}` ({} bytes)", body.len());
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        check_status(&url, response)?;
        Ok(())
    }

    async fn upload(&self, upload: Upload) -> Result<ResourceRef> {
        let (route, field) = upload_route(upload.kind);
        let url = self.config.endpoint(route);
        let part = Part::bytes(upload.bytes).file_name(upload.file_name);
        let form = Form::new().part(field, part);
        let response = check_status(&url, self.client.post(&url).multipart(form).send().await?)?;
        Ok(parse_resource(&response.text().await?))
    }

    async fn find_depth(&self, panorama: &ResourceRef) -> Result<DepthMap> {
        let url = self.config.endpoint("depth");
        let body = serde_json::to_vec(panorama)?;
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let body = check_status(&url, response)?.text().await?;
        let parsed: DepthResponse = serde_json::from_str(&body)?;
        Ok(parsed.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use pt_core::TourLocation;

    #[test]
    fn save_body_carries_id_next_to_tour_fields() {
        let mut tour = TourGraph::new("Campus", "North side");
        tour.insert_location(TourLocation::new("Lobby", "lobby.jpg".into()));
        let id = TourId::new("campus").unwrap();

        let value = serde_json::to_value(SaveBody { tour: &tour, id }).unwrap();
        assert_eq!(value["_id"], "campus");
        assert_eq!(value["title"], "Campus");
        assert_eq!(value["startingLocation"], "lobby");

        // The server echoes `_id` back on list; reading ignores it.
        let back: TourGraph = serde_json::from_value(value).unwrap();
        assert_eq!(back, tour);
    }

    #[test]
    fn one_bad_tour_does_not_sink_the_list() {
        let body = r#"{
            "campus": {"title": "Campus", "locations": {
                "lobby": {"title": "Lobby", "overlays": [{"position": [0.5, 0.5, 1],
                    "actions": [{"type": "portal", "destination": ""}]}]}}},
            "annex": {"title": "Annex", "locations": {"Dexter Lawn": {"title": "Lawn"}}},
            "Bad Id": {"title": "Bad"},
            "broken": 42
        }"#;
        let tours = decode_tour_list(body).unwrap();
        assert_eq!(tours.keys().map(|id| id.as_str()).collect::<Vec<_>>(), vec!["campus"]);
        assert_eq!(tours[&TourId::new("campus").unwrap()].title, "Campus");

        assert!(decode_tour_list("[]").is_err());
    }

    #[test]
    fn upload_routes_per_kind() {
        assert_eq!(upload_route(ResourceKind::Image), ("uploadImage", "image"));
        assert_eq!(upload_route(ResourceKind::Video), ("uploadVideo", "video"));
        assert_eq!(upload_route(ResourceKind::Raw), ("uploadRaw", "file"));
    }

    #[test]
    fn upload_response_as_json_or_text() {
        assert_eq!(parse_resource("\"https://cdn/x.jpg\"").as_str(), "https://cdn/x.jpg");
        assert_eq!(parse_resource("https://cdn/x.jpg\n").as_str(), "https://cdn/x.jpg");
    }

    #[test]
    fn depth_response_shape() {
        let parsed: DepthResponse = serde_json::from_str(r#"{"data": [[1, 2], [3, 4]]}"#).unwrap();
        assert_eq!(parsed.data.width(), 2);
        assert_eq!(parsed.data.get(1, 1), Some(4.0));
    }

    #[test]
    fn builds_from_default_config() {
        let backend = HttpBackend::new(ClientConfig::default()).unwrap();
        assert_eq!(backend.config().endpoint("tour"), "http://127.0.0.1:5000/tour");
    }
}
